//! The blog's models and some sample data.

use std::sync::Arc;

use xadmin_rs_core::AdminResult;
use xadmin_rs_db::{FieldDef, FieldType, InMemoryStore, ModelMeta, Record};

pub fn author() -> ModelMeta {
    ModelMeta::new("blog", "Author")
        .field(FieldDef::new("name", FieldType::Char).max_length(100))
        .field(FieldDef::new("email", FieldType::Email).optional())
        .display_field("name")
}

pub fn post() -> ModelMeta {
    ModelMeta::new("blog", "Post")
        .field(FieldDef::new("title", FieldType::Char).max_length(200))
        .field(FieldDef::new("body", FieldType::Text).optional())
        .field(
            FieldDef::new("status", FieldType::Char)
                .choices([("draft", "Draft"), ("published", "Published")])
                .default_value("draft"),
        )
        .field(FieldDef::new("author", FieldType::ForeignKey).related_model("blog.author"))
        .display_field("title")
}

pub fn comment() -> ModelMeta {
    ModelMeta::new("blog", "Comment")
        .field(FieldDef::new("post", FieldType::ForeignKey).related_model("blog.post"))
        .field(FieldDef::new("text", FieldType::Text))
}

/// A store holding two authors, four posts and a comment.
pub fn sample_store() -> AdminResult<Arc<InMemoryStore>> {
    let store = InMemoryStore::new();
    store.seed(
        &author(),
        [
            Record::new().with("name", "Grace").with("email", "grace@example.com"),
            Record::new().with("name", "Linus"),
        ],
    )?;
    store.seed(
        &post(),
        [
            ("Welcome", "published", 1),
            ("Why plugins", "published", 1),
            ("Hook chains explained", "draft", 2),
            ("Untitled", "draft", 2),
        ]
        .into_iter()
        .map(|(title, status, author)| {
            Record::new()
                .with("title", title)
                .with("status", status)
                .with("author", author)
        }),
    )?;
    store.seed(&comment(), [Record::new().with("post", 1).with("text", "Nice start!")])?;
    Ok(Arc::new(store))
}
