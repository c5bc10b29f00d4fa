//! Constants and type definitions for Unity text-serialized documents
//!
//! Class ids, the property keys the resolver and hierarchy builder read,
//! and line ending detection.

/// Unity YAML tag URI
pub const UNITY_TAG_URI: &str = "tag:unity3d.com,2011:";

/// Unity YAML version
pub const UNITY_YAML_VERSION: (u32, u32) = (1, 1);

/// Line ending types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Unix, // \n
    Windows, // \r\n
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Unix => "\n",
            LineEnding::Windows => "\r\n",
        }
    }

    /// Detect the line ending used by the first line break of `text`
    pub fn detect(text: &str) -> Self {
        match text.find('\n') {
            Some(pos) if pos > 0 && text.as_bytes()[pos - 1] == b'\r' => LineEnding::Windows,
            _ => LineEnding::Unix,
        }
    }
}

/// Common Unity class IDs
pub mod class_ids {
    pub const OBJECT: u32 = 0;
    pub const GAME_OBJECT: u32 = 1;
    pub const COMPONENT: u32 = 2;
    pub const TRANSFORM: u32 = 4;
    pub const CAMERA: u32 = 20;
    pub const MATERIAL: u32 = 21;
    pub const MESH_RENDERER: u32 = 23;
    pub const MESH_FILTER: u32 = 33;
    pub const RIGIDBODY: u32 = 54;
    pub const BOX_COLLIDER: u32 = 65;
    pub const MONO_BEHAVIOUR: u32 = 114;
    pub const MONO_SCRIPT: u32 = 115;
    pub const SPRITE_RENDERER: u32 = 212;
    pub const RECT_TRANSFORM: u32 = 224;
    pub const CANVAS_RENDERER: u32 = 222;
    pub const PREFAB_INSTANCE: u32 = 1001;
    pub const SCENE_ROOTS: u32 = 1660057539;
}

/// Common Unity class names
pub mod class_names {
    pub const GAME_OBJECT: &str = "GameObject";
    pub const TRANSFORM: &str = "Transform";
    pub const RECT_TRANSFORM: &str = "RectTransform";
    pub const MONO_BEHAVIOUR: &str = "MonoBehaviour";
    /// Pre-2018.3 name for class 1001
    pub const PREFAB: &str = "Prefab";
    pub const PREFAB_INSTANCE: &str = "PrefabInstance";
    pub const SCENE_ROOTS: &str = "SceneRoots";
}

/// Property keys read by the resolver and hierarchy builder
pub mod keys {
    pub const NAME: &str = "m_Name";
    pub const IS_ACTIVE: &str = "m_IsActive";
    pub const GAME_OBJECT: &str = "m_GameObject";
    pub const COMPONENT: &str = "m_Component";
    pub const FATHER: &str = "m_Father";
    pub const CHILDREN: &str = "m_Children";
    pub const ROOT_ORDER: &str = "m_RootOrder";
    pub const ROOTS: &str = "m_Roots";
    pub const SCRIPT: &str = "m_Script";
    pub const PREFAB_INSTANCE: &str = "m_PrefabInstance";
    pub const LEGACY_PREFAB_INTERNAL: &str = "m_PrefabInternal";
    pub const SOURCE_PREFAB: &str = "m_SourcePrefab";
    pub const LEGACY_PARENT_PREFAB: &str = "m_ParentPrefab";
    pub const MODIFICATION: &str = "m_Modification";
    pub const MODIFICATIONS: &str = "m_Modifications";
    pub const TRANSFORM_PARENT: &str = "m_TransformParent";
    pub const REMOVED_COMPONENTS: &str = "m_RemovedComponents";
    pub const FILE_ID: &str = "fileID";
    pub const GUID: &str = "guid";
    pub const TYPE: &str = "type";
}

/// Get the well-known class name for a class id
///
/// Documents carry their own class name line, so this is only a fallback
/// for objects created programmatically.
pub fn class_name_for(class_id: u32) -> Option<&'static str> {
    let name = match class_id {
        0 => "Object",
        1 => "GameObject",
        2 => "Component",
        4 => "Transform",
        8 => "Behaviour",
        20 => "Camera",
        21 => "Material",
        23 => "MeshRenderer",
        25 => "Renderer",
        33 => "MeshFilter",
        54 => "Rigidbody",
        64 => "MeshCollider",
        65 => "BoxCollider",
        82 => "AudioSource",
        95 => "Animator",
        108 => "Light",
        114 => "MonoBehaviour",
        115 => "MonoScript",
        135 => "SphereCollider",
        136 => "CapsuleCollider",
        137 => "SkinnedMeshRenderer",
        198 => "ParticleSystem",
        199 => "ParticleSystemRenderer",
        212 => "SpriteRenderer",
        222 => "CanvasRenderer",
        223 => "Canvas",
        224 => "RectTransform",
        1001 => "PrefabInstance",
        1660057539 => "SceneRoots",
        _ => return None,
    };
    Some(name)
}

/// Whether a class id carries the transform hierarchy
pub fn is_transform_class(class_id: u32) -> bool {
    class_id == class_ids::TRANSFORM || class_id == class_ids::RECT_TRANSFORM
}
