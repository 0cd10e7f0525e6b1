//! Built-in view types.
//!
//! ```text
//! BaseAdminView
//! ├── CommAdminView
//! │   ├── IndexView
//! │   └── ModelAdminView
//! │       ├── ListAdminView
//! │       ├── ModelFormAdminView
//! │       │   ├── CreateAdminView
//! │       │   └── UpdateAdminView
//! │       ├── DeleteAdminView
//! │       └── DetailAdminView
//! ├── LoginView
//! ├── LogoutView
//! └── UserSettingView
//! ```

pub mod base;
pub mod comm;
pub mod delete;
pub mod detail;
pub mod edit;
pub mod list;
pub mod model;
pub mod website;

use xadmin_rs_core::AdminResult;

use crate::registry::RegistryBuilder;

pub use base::BASE_ADMIN_VIEW;
pub use comm::COMM_ADMIN_VIEW;
pub use delete::DELETE_VIEW;
pub use detail::DETAIL_VIEW;
pub use edit::{CREATE_VIEW, FORMFIELD_FOR_DBFIELD, MODEL_FORM_VIEW, UPDATE_VIEW};
pub use list::LIST_VIEW;
pub use model::MODEL_ADMIN_VIEW;
pub use website::{INDEX_VIEW, LOGIN_VIEW, LOGOUT_VIEW, USER_SETTING_VIEW};

impl RegistryBuilder {
    /// Mounts the standard site and model views.
    ///
    /// | route | view | name |
    /// |---|---|---|
    /// | `^$` | index | `index` |
    /// | `^login/$` | login | `login` |
    /// | `^logout/$` | logout | `logout` |
    /// | `^settings/user$` | user settings | `user_settings` |
    /// | `<model>/^$` | list | `%s_%s_changelist` |
    /// | `<model>/^add/$` | create | `%s_%s_add` |
    /// | `<model>/^(.+)/delete/$` | delete | `%s_%s_delete` |
    /// | `<model>/^(.+)/update/$` | update | `%s_%s_change` |
    /// | `<model>/^(.+)/detail/$` | detail | `%s_%s_detail` |
    pub fn register_builtin_views(&mut self) -> AdminResult<()> {
        self.register_view("^$", &INDEX_VIEW, "index")?;
        self.register_view("^login/$", &LOGIN_VIEW, "login")?;
        self.register_view("^logout/$", &LOGOUT_VIEW, "logout")?;
        self.register_view("^settings/user$", &USER_SETTING_VIEW, "user_settings")?;

        self.register_modelview("^$", &LIST_VIEW, "%s_%s_changelist")?;
        self.register_modelview("^add/$", &CREATE_VIEW, "%s_%s_add")?;
        self.register_modelview("^(.+)/delete/$", &DELETE_VIEW, "%s_%s_delete")?;
        self.register_modelview("^(.+)/update/$", &UPDATE_VIEW, "%s_%s_change")?;
        self.register_modelview("^(.+)/detail/$", &DETAIL_VIEW, "%s_%s_detail")?;
        Ok(())
    }
}

/// A blog site shared by the view tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use serde_json::json;
    use xadmin_rs_core::AdminSettings;
    use xadmin_rs_test::{fixtures, RequestFactory};

    use crate::options::AdminOptions;
    use crate::registry::RegistryBuilder;
    use crate::site::AdminSite;

    /// Authors and articles, registered in that order, over the fixture
    /// store.
    pub(crate) fn blog_builder() -> RegistryBuilder {
        let mut builder = RegistryBuilder::with_defaults().unwrap();
        builder
            .register(fixtures::author_meta(), AdminOptions::new("AuthorAdmin"))
            .unwrap();
        builder
            .register(
                fixtures::article_meta(),
                AdminOptions::new("ArticleAdmin").attr("list_display", json!(["title", "status"])),
            )
            .unwrap();
        builder
    }

    pub(crate) fn site_from(builder: RegistryBuilder) -> Arc<AdminSite> {
        Arc::new(
            AdminSite::new(builder.build(), AdminSettings::default())
                .with_store(fixtures::blog_store())
                .with_authenticator(fixtures::authenticator()),
        )
    }

    pub(crate) fn blog_site() -> Arc<AdminSite> {
        site_from(blog_builder())
    }

    pub(crate) fn admin() -> RequestFactory {
        RequestFactory::new().user(fixtures::superuser())
    }
}
