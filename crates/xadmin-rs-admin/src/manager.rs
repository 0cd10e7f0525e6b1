//! Per-request plugin instantiation.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use xadmin_rs_core::AdminResult;

use crate::plugin::{AdminPlugin, MergedPlugin, PluginClass};
use crate::view::AdminView;

/// A plugin instance that accepted the current request.
#[derive(Clone)]
pub struct ActivePlugin {
    class: Arc<PluginClass>,
    instance: Rc<dyn AdminPlugin>,
}

impl ActivePlugin {
    /// The plugin's class.
    pub fn class(&self) -> &Arc<PluginClass> {
        &self.class
    }

    /// The plugin id.
    pub fn id(&self) -> &str {
        self.class.id()
    }

    /// The plugin order.
    pub fn order(&self) -> i32 {
        self.class.order()
    }

    /// The instance.
    pub fn instance(&self) -> &dyn AdminPlugin {
        self.instance.as_ref()
    }

    /// The instance as its concrete type.
    pub fn downcast<P: AdminPlugin + 'static>(&self) -> Option<&P> {
        self.instance().as_any().downcast_ref::<P>()
    }

    pub(crate) fn shared(&self) -> Rc<dyn AdminPlugin> {
        Rc::clone(&self.instance)
    }
}

impl fmt::Debug for ActivePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivePlugin")
            .field("id", &self.id())
            .field("order", &self.order())
            .finish()
    }
}

/// Instantiates the merged plugins of a composed view, in ascending order
/// (registration order among equals), and keeps those whose
/// `init_request` accepts the request.
///
/// Errors from a factory, `init_request` or `setup` propagate and abort the
/// request; plugins after the failing one are never instantiated.
pub fn init_plugins(view: &mut AdminView, merged: &[MergedPlugin]) -> AdminResult<Vec<ActivePlugin>> {
    let mut ordered: Vec<&MergedPlugin> = merged.iter().collect();
    ordered.sort_by_key(|p| p.order());

    let mut active = Vec::with_capacity(ordered.len());
    for merged in ordered {
        let mut instance = merged.class.instantiate(&merged.settings)?;
        if instance.init_request(view)? {
            instance.setup(view)?;
            tracing::debug!(plugin = merged.id(), order = merged.order(), "plugin active");
            active.push(ActivePlugin {
                class: Arc::clone(&merged.class),
                instance: Rc::from(instance),
            });
        } else {
            tracing::debug!(plugin = merged.id(), "plugin inactive for this request");
        }
    }
    active.sort_by_key(ActivePlugin::order);
    Ok(active)
}
