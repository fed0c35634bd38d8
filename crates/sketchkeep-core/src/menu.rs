//! The file submenu layered onto the editor's main menu.

use serde::{Deserialize, Serialize};

/// Id of the menu group holding the file submenu.
pub const FILE_MENU_GROUP_ID: &str = "file_menu";

/// Id of the file submenu.
pub const FILE_SUBMENU_ID: &str = "file_menu_sub";

/// A file menu command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuAction {
    /// Replace the document with the blank template.
    Reset,
    /// Import a document file.
    Load,
    /// Export the document as a file.
    Save,
}

impl MenuAction {
    /// All actions, in menu order.
    pub const ALL: [MenuAction; 3] = [MenuAction::Reset, MenuAction::Load, MenuAction::Save];

    /// Stable id understood by the editor's menu.
    pub fn id(self) -> &'static str {
        match self {
            MenuAction::Reset => "file_menu_sub_new",
            MenuAction::Load => "file_menu_sub_load",
            MenuAction::Save => "file_menu_sub_save",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.id() == id)
    }

    pub fn label(self, labels: &MenuLabels) -> &str {
        match self {
            MenuAction::Reset => &labels.reset,
            MenuAction::Load => &labels.load,
            MenuAction::Save => &labels.save,
        }
    }
}

/// Display text for the file submenu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuLabels {
    pub submenu: String,
    pub reset: String,
    pub load: String,
    pub save: String,
}

impl MenuLabels {
    /// Simplified Chinese labels.
    pub fn chinese() -> Self {
        Self {
            submenu: "文件".to_string(),
            reset: "清屏".to_string(),
            load: "打开".to_string(),
            save: "保存".to_string(),
        }
    }

    pub fn english() -> Self {
        Self {
            submenu: "File".to_string(),
            reset: "Clear".to_string(),
            load: "Open".to_string(),
            save: "Save".to_string(),
        }
    }

    /// Labels for a BCP 47 language tag such as `en-US` or `zh-CN`.
    /// Unknown languages get the default set.
    pub fn for_locale(locale: &str) -> Self {
        let language = locale.split(['-', '_']).next().unwrap_or_default();
        if language.eq_ignore_ascii_case("en") {
            Self::english()
        } else {
            Self::default()
        }
    }
}

impl Default for MenuLabels {
    fn default() -> Self {
        Self::chinese()
    }
}

/// One entry of the file submenu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub label: String,
    /// Shown even when the editor is read-only.
    pub readonly_ok: bool,
    pub action: MenuAction,
}

/// The file submenu as handed to the editor's menu renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuDescriptor {
    pub group_id: String,
    pub submenu_id: String,
    pub label: String,
    pub items: Vec<MenuItem>,
}

impl MenuDescriptor {
    pub fn new(labels: &MenuLabels) -> Self {
        Self {
            group_id: FILE_MENU_GROUP_ID.to_string(),
            submenu_id: FILE_SUBMENU_ID.to_string(),
            label: labels.submenu.clone(),
            items: MenuAction::ALL
                .into_iter()
                .map(|action| MenuItem {
                    id: action.id().to_string(),
                    label: action.label(labels).to_string(),
                    readonly_ok: true,
                    action,
                })
                .collect(),
        }
    }
}

impl Default for MenuDescriptor {
    fn default() -> Self {
        Self::new(&MenuLabels::default())
    }
}
