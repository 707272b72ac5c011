//! Collection editing session.
//!
//! Holds the working copy of the catalog while an administrator edits it,
//! applies editing commands and tracks images that still have to be
//! uploaded. Nothing here touches the disk; the caller saves [`export`]ed
//! items through the collection store.
//!
//! [`export`]: CollectionEditor::export

use serde::{Deserialize, Serialize};
use validator::Validate;

use showroom_common::{AppError, AppResult};

use super::collection::CollectionItem;

/// Where staged images go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    /// Staged images become upload requests for the image endpoint.
    Server,
    /// Staged images stay on the item as data URLs until exported.
    Local,
}

/// Form contents for adding or updating an item.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    #[validate(length(min = 1, message = "Gender is required"))]
    pub gender: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Price is required"))]
    pub price: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub desc: String,
    #[validate(length(min = 1, message = "Alt text is required"))]
    pub alt: String,
    /// Newly chosen image as a data URL.
    #[serde(default)]
    pub image_data_url: Option<String>,
}

impl ItemDraft {
    fn trimmed(self) -> Self {
        Self {
            gender: self.gender.trim().to_string(),
            category: self.category.trim().to_string(),
            title: self.title.trim().to_string(),
            price: self.price.trim().to_string(),
            desc: self.desc.trim().to_string(),
            alt: self.alt.trim().to_string(),
            image_data_url: self.image_data_url.filter(|url| !url.trim().is_empty()),
        }
    }
}

/// An editing command.
#[derive(Debug, Clone)]
pub enum EditorCommand {
    Add(ItemDraft),
    Update { index: usize, draft: ItemDraft },
    Delete { index: usize },
    SetActive { index: usize, active: bool },
}

/// Image the caller has to send to the image endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpload {
    pub data_url: String,
    pub filename: String,
}

/// Result of applying one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorOutcome {
    /// Index of the affected item (for `Delete`, the index it had).
    pub index: usize,
    /// Upload to perform, in server mode, when the command staged an image.
    pub upload: Option<PendingUpload>,
}

/// Working copy of the catalog.
#[derive(Debug, Clone)]
pub struct CollectionEditor {
    mode: EditorMode,
    items: Vec<CollectionItem>,
    pending: Vec<PendingUpload>,
    dirty: bool,
}

impl CollectionEditor {
    /// Start a session from loaded items.
    #[must_use]
    pub const fn new(mode: EditorMode, items: Vec<CollectionItem>) -> Self {
        Self {
            mode,
            items,
            pending: Vec::new(),
            dirty: false,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> EditorMode {
        self.mode
    }

    #[must_use]
    pub fn items(&self) -> &[CollectionItem] {
        &self.items
    }

    /// Whether there are changes not yet exported.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Apply a command.
    pub fn apply(&mut self, command: EditorCommand) -> AppResult<EditorOutcome> {
        let outcome = match command {
            EditorCommand::Add(draft) => {
                let draft = validated(draft)?;
                let mut item = CollectionItem {
                    tags: Vec::new(),
                    img: String::new(),
                    alt: String::new(),
                    title: String::new(),
                    desc: String::new(),
                    price: String::new(),
                    active: true,
                    image_data_url: None,
                    needs_upload: false,
                    extra: serde_json::Map::new(),
                };
                let upload = self.fill(&mut item, draft);
                self.items.push(item);
                EditorOutcome {
                    index: self.items.len() - 1,
                    upload,
                }
            }
            EditorCommand::Update { index, draft } => {
                self.check_index(index)?;
                let draft = validated(draft)?;
                let mut item = self.items[index].clone();
                let upload = self.fill(&mut item, draft);
                self.items[index] = item;
                EditorOutcome { index, upload }
            }
            EditorCommand::Delete { index } => {
                self.check_index(index)?;
                let removed = self.items.remove(index);
                self.forget_upload(&removed.img);
                EditorOutcome {
                    index,
                    upload: None,
                }
            }
            EditorCommand::SetActive { index, active } => {
                self.check_index(index)?;
                self.items[index].active = active;
                EditorOutcome {
                    index,
                    upload: None,
                }
            }
        };

        self.dirty = true;
        Ok(outcome)
    }

    /// Items matching a free-text term and, optionally, a tag.
    ///
    /// The term is matched case-insensitively against title, description
    /// and price; the tag must equal one of the item's tags.
    #[must_use]
    pub fn search(&self, term: &str, tag: Option<&str>) -> Vec<(usize, &CollectionItem)> {
        let term = term.trim().to_lowercase();
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| {
                let text = format!("{} {} {}", item.title, item.desc, item.price).to_lowercase();
                let tag_ok = tag.is_none_or(|tag| item.tags.iter().any(|t| t == tag));
                tag_ok && (term.is_empty() || text.contains(&term))
            })
            .collect()
    }

    /// Images staged but not yet uploaded or exported.
    #[must_use]
    pub fn pending_uploads(&self) -> Vec<PendingUpload> {
        match self.mode {
            EditorMode::Server => self.pending.clone(),
            EditorMode::Local => self
                .items
                .iter()
                .filter(|item| item.needs_upload)
                .filter_map(|item| {
                    Some(PendingUpload {
                        data_url: item.image_data_url.clone()?,
                        filename: file_name_of(&item.img).to_string(),
                    })
                })
                .collect(),
        }
    }

    /// Record where the server actually stored an upload. The image service
    /// sanitizes names, so the stored path can differ from the staged one.
    pub fn set_image_path(&mut self, staged_filename: &str, stored_path: &str) {
        for item in &mut self.items {
            if file_name_of(&item.img) == staged_filename && item.img != stored_path {
                item.img = stored_path.to_string();
                self.dirty = true;
            }
        }
        self.pending.retain(|p| p.filename != staged_filename);
    }

    /// The catalog as it should be saved. Clears the session's upload flags
    /// and dirty state.
    pub fn export(&mut self) -> Vec<CollectionItem> {
        for item in &mut self.items {
            item.needs_upload = false;
        }
        self.pending.clear();
        self.dirty = false;
        self.items
            .iter()
            .cloned()
            .map(CollectionItem::without_transient)
            .collect()
    }

    fn check_index(&self, index: usize) -> AppResult<()> {
        if index < self.items.len() {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("No item at index {index}")))
        }
    }

    /// Copy draft fields onto `item` and stage its image, if any.
    fn fill(&mut self, item: &mut CollectionItem, draft: ItemDraft) -> Option<PendingUpload> {
        item.tags = vec![draft.gender, draft.category];
        item.title = draft.title;
        item.alt = draft.alt;
        item.desc = draft.desc;
        item.price = draft.price;

        let data_url = draft.image_data_url?;
        let filename = format!("{}.jpg", slug_or_default(&item.title));
        item.img = format!("img/collections/{filename}");

        match self.mode {
            EditorMode::Local => {
                item.image_data_url = Some(data_url);
                item.needs_upload = true;
                None
            }
            EditorMode::Server => {
                let upload = PendingUpload { data_url, filename };
                self.pending.retain(|p| p.filename != upload.filename);
                self.pending.push(upload.clone());
                Some(upload)
            }
        }
    }

    fn forget_upload(&mut self, img: &str) {
        let still_used = self.items.iter().any(|item| item.img == img);
        if !still_used {
            let name = file_name_of(img);
            self.pending.retain(|p| p.filename != name);
        }
    }
}

fn validated(draft: ItemDraft) -> AppResult<ItemDraft> {
    let draft = draft.trimmed();
    draft.validate()?;
    Ok(draft)
}

fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn slug_or_default(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        "image".to_string()
    } else {
        slug
    }
}

/// Lowercase, collapse every run of characters outside `[a-z0-9]` into one
/// `-`, and trim `-` from both ends.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut gap = false;
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c);
            gap = false;
        } else {
            gap = true;
        }
    }
    slug
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn draft(title: &str) -> ItemDraft {
        ItemDraft {
            gender: "Female".to_string(),
            category: "Dresses".to_string(),
            title: title.to_string(),
            price: "$120".to_string(),
            desc: "Silk evening dress".to_string(),
            alt: format!("{title} photo"),
            image_data_url: None,
        }
    }

    fn with_image(mut draft: ItemDraft) -> ItemDraft {
        draft.image_data_url = Some("data:image/png;base64,AAAA".to_string());
        draft
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Summer Dress 2026!"), "summer-dress-2026");
        assert_eq!(slugify("  --Linen  Shirt--  "), "linen-shirt");
        assert_eq!(slugify("Été"), "t");
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slug_or_default("!!!"), "image");
    }

    #[test]
    fn test_add_validates_draft() {
        let mut editor = CollectionEditor::new(EditorMode::Server, Vec::new());
        let mut bad = draft("Gown");
        bad.price = "   ".to_string();

        let err = editor.apply(EditorCommand::Add(bad)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(editor.items().is_empty());
        assert!(!editor.is_dirty());
    }

    #[test]
    fn test_add_in_server_mode_requests_upload() {
        let mut editor = CollectionEditor::new(EditorMode::Server, Vec::new());

        let outcome = editor
            .apply(EditorCommand::Add(with_image(draft("  Summer Dress "))))
            .unwrap();

        assert_eq!(outcome.index, 0);
        let upload = outcome.upload.unwrap();
        assert_eq!(upload.filename, "summer-dress.jpg");
        let item = &editor.items()[0];
        assert_eq!(item.title, "Summer Dress");
        assert_eq!(item.tags, vec!["Female", "Dresses"]);
        assert_eq!(item.img, "img/collections/summer-dress.jpg");
        assert!(item.active);
        assert!(item.image_data_url.is_none());
        assert_eq!(editor.pending_uploads(), vec![upload]);
        assert!(editor.is_dirty());
    }

    #[test]
    fn test_local_mode_stages_data_url_on_item() {
        let mut editor = CollectionEditor::new(EditorMode::Local, Vec::new());

        let outcome = editor
            .apply(EditorCommand::Add(with_image(draft("Coat"))))
            .unwrap();
        assert!(outcome.upload.is_none());

        let item = &editor.items()[0];
        assert!(item.needs_upload);
        assert_eq!(item.img, "img/collections/coat.jpg");
        assert_eq!(editor.pending_uploads().len(), 1);
        assert_eq!(editor.pending_uploads()[0].filename, "coat.jpg");

        let exported = editor.export();
        assert!(exported[0].image_data_url.is_none());
        assert!(!exported[0].needs_upload);
        assert!(editor.pending_uploads().is_empty());
        assert!(!editor.is_dirty());
    }

    #[test]
    fn test_update_keeps_image_and_active_state() {
        let mut editor = CollectionEditor::new(EditorMode::Server, Vec::new());
        editor
            .apply(EditorCommand::Add(with_image(draft("Coat"))))
            .unwrap();
        editor
            .apply(EditorCommand::SetActive {
                index: 0,
                active: false,
            })
            .unwrap();

        let mut changed = draft("Wool Coat");
        changed.price = "$300".to_string();
        let outcome = editor
            .apply(EditorCommand::Update {
                index: 0,
                draft: changed,
            })
            .unwrap();

        assert!(outcome.upload.is_none());
        let item = &editor.items()[0];
        assert_eq!(item.title, "Wool Coat");
        assert_eq!(item.price, "$300");
        assert_eq!(item.img, "img/collections/coat.jpg");
        assert!(!item.active);
    }

    #[test]
    fn test_out_of_range_index_is_not_found() {
        let mut editor = CollectionEditor::new(EditorMode::Server, Vec::new());
        for command in [
            EditorCommand::Delete { index: 0 },
            EditorCommand::SetActive {
                index: 3,
                active: true,
            },
            EditorCommand::Update {
                index: 1,
                draft: draft("x"),
            },
        ] {
            let err = editor.apply(command).unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)));
        }
    }

    #[test]
    fn test_delete_drops_orphaned_upload() {
        let mut editor = CollectionEditor::new(EditorMode::Server, Vec::new());
        editor
            .apply(EditorCommand::Add(with_image(draft("Hat"))))
            .unwrap();
        editor.apply(EditorCommand::Add(draft("Scarf"))).unwrap();

        editor.apply(EditorCommand::Delete { index: 0 }).unwrap();

        assert_eq!(editor.items().len(), 1);
        assert_eq!(editor.items()[0].title, "Scarf");
        assert!(editor.pending_uploads().is_empty());
    }

    #[test]
    fn test_set_image_path_follows_stored_name() {
        let mut editor = CollectionEditor::new(EditorMode::Server, Vec::new());
        editor
            .apply(EditorCommand::Add(with_image(draft("Hat"))))
            .unwrap();

        editor.set_image_path("hat.jpg", "img/collections/hat.png");

        assert_eq!(editor.items()[0].img, "img/collections/hat.png");
        assert!(editor.pending_uploads().is_empty());
    }

    #[test]
    fn test_search_by_term_and_tag() {
        let mut editor = CollectionEditor::new(EditorMode::Server, Vec::new());
        editor.apply(EditorCommand::Add(draft("Silk Gown"))).unwrap();
        let mut shirt = draft("Linen Shirt");
        shirt.gender = "Male".to_string();
        shirt.category = "Shirts".to_string();
        shirt.desc = "Breathable".to_string();
        editor.apply(EditorCommand::Add(shirt)).unwrap();

        let hits = editor.search("SILK", None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 0);

        let male = editor.search("", Some("Male"));
        assert_eq!(male.len(), 1);
        assert_eq!(male[0].1.title, "Linen Shirt");

        assert!(editor.search("$120", Some("Shirts")).len() == 1);
        assert!(editor.search("velvet", None).is_empty());
    }
}
