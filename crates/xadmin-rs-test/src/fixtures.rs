//! Ready-made users, models and records for admin tests.
//!
//! The blog fixture has two models: `blog.author` and `blog.article`, whose
//! `author` field is a foreign key to `blog.author`.

use std::sync::Arc;

use xadmin_rs_auth::{AdminUser, Group, InMemoryAuthenticator};
use xadmin_rs_db::{FieldDef, FieldType, InMemoryStore, ModelMeta, Record};

/// The password of every fixture user.
pub const PASSWORD: &str = "secret";

// ── Users ────────────────────────────────────────────────────────────

pub fn superuser() -> AdminUser {
    AdminUser::new(1, "admin").staff().superuser()
}

/// Staff that may view and change articles, and view authors.
pub fn editor() -> AdminUser {
    AdminUser::new(2, "editor").staff().with_group(
        Group::new("editors")
            .with_perm("blog.view_article")
            .with_perm("blog.change_article")
            .with_perm("blog.view_author"),
    )
}

/// Staff without any model permission.
pub fn staff() -> AdminUser {
    AdminUser::new(3, "staff").staff()
}

/// A deactivated superuser.
pub fn inactive() -> AdminUser {
    AdminUser::new(4, "former").staff().superuser().inactive()
}

pub fn anonymous() -> AdminUser {
    AdminUser::anonymous()
}

/// An authenticator knowing every fixture user, all with [`PASSWORD`].
pub fn authenticator() -> Arc<InMemoryAuthenticator> {
    let auth = InMemoryAuthenticator::new();
    for user in [superuser(), editor(), staff(), inactive()] {
        auth.add_user(user, PASSWORD);
    }
    Arc::new(auth)
}

// ── Models ───────────────────────────────────────────────────────────

pub fn author_meta() -> ModelMeta {
    ModelMeta::new("blog", "Author")
        .field(FieldDef::new("name", FieldType::Char).max_length(100))
        .field(FieldDef::new("email", FieldType::Email).optional())
        .display_field("name")
}

pub fn article_meta() -> ModelMeta {
    ModelMeta::new("blog", "Article")
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

// ── Records ──────────────────────────────────────────────────────────

/// A store with three authors and five articles. Author 3 wrote articles
/// 3 to 5; articles 4 and 5 are published.
///
/// # Panics
///
/// Panics if the in-memory store rejects a record.
pub fn blog_store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new();
    let authors = [("Ada", "ada@example.com"), ("Brian", "brian@example.com"), ("Cleo", "cleo@example.com")];
    store
        .seed(
            &author_meta(),
            authors
                .iter()
                .map(|(name, email)| Record::new().with("name", *name).with("email", *email)),
        )
        .expect("seed authors");

    let articles = [
        ("Hello", "draft", 1),
        ("Second post", "draft", 2),
        ("Drafting", "draft", 3),
        ("Release notes", "published", 3),
        ("Roadmap", "published", 3),
    ];
    store
        .seed(
            &article_meta(),
            articles.iter().map(|(title, status, author)| {
                Record::new()
                    .with("title", *title)
                    .with("status", *status)
                    .with("author", *author)
            }),
        )
        .expect("seed articles");
    Arc::new(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xadmin_rs_db::{ModelStore, QuerySet};

    #[test]
    fn test_blog_store_counts() {
        let store = blog_store();
        let meta = article_meta();
        assert_eq!(store.count(&meta, &QuerySet::new(meta.label())).unwrap(), 5);
        assert_eq!(store.all(&author_meta()).len(), 3);
    }

    #[test]
    fn test_article_relates_to_author() {
        let author = author_meta();
        assert!(article_meta().get_field("author").unwrap().is_relation());
        assert_eq!(author.label(), "blog.author");
    }

    #[test]
    fn test_editor_perms() {
        assert!(editor().has_perm("blog.change_article"));
        assert!(!editor().has_perm("blog.delete_article"));
        assert!(!staff().has_perm("blog.view_article"));
    }
}
