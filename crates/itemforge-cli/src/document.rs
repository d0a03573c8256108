use itemforge_types::{ListError, ServerItem, ServerItemList, VersionInfo};
use serde::{Deserialize, Serialize};

/// JSON interchange form of a server item list, used by `read` (output)
/// and `write` (input).
#[derive(Debug, Serialize, Deserialize)]
pub struct ListDocument {
    pub version: VersionInfo,
    pub description: String,
    pub items: Vec<ServerItem>,
}

impl ListDocument {
    pub fn from_list(list: &ServerItemList) -> Self {
        Self {
            version: list.version,
            description: list.description.clone(),
            items: list.iter().cloned().collect(),
        }
    }

    pub fn into_list(self) -> Result<ServerItemList, ListError> {
        let mut list = ServerItemList::new();
        list.version = self.version;
        list.description = self.description;
        for item in self.items {
            list.add(item)?;
        }
        list.clear_dirty();
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itemforge_types::ServerItemType;

    #[test]
    fn test_document_roundtrip() {
        let mut list = ServerItemList::new();
        list.version.major = 3;
        list.description = "doc test".into();
        let mut item = ServerItem::new(100, ServerItemType::Ground);
        item.name = "dirt".into();
        list.add(item).unwrap();

        let json = serde_json::to_string(&ListDocument::from_list(&list)).unwrap();
        let back: ListDocument = serde_json::from_str(&json).unwrap();
        let rebuilt = back.into_list().unwrap();
        assert_eq!(rebuilt, list);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let document = ListDocument {
            version: VersionInfo::default(),
            description: String::new(),
            items: vec![
                ServerItem::new(7, ServerItemType::Ground),
                ServerItem::new(7, ServerItemType::Fluid),
            ],
        };
        assert!(document.into_list().is_err());
    }
}
