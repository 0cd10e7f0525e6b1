//! The hook dispatcher.
//!
//! An extension point is a [`Hook`] key: a name plus the type of value it
//! produces and the type of argument it receives. Invoking a hook on a view
//! builds a chain of links around the view's own implementation:
//!
//! ```text
//! option overrides (most specific outermost)
//!   -> plugin handlers (lowest order outermost, then lowest priority)
//!     -> base implementation
//! ```
//!
//! Every link receives an explicit [`Next`] continuation. A link decides
//! whether to call it, and whether to transform what it returns.
//!
//! Plugin handlers come in three shapes, see [`Handler`]:
//!
//! - [`Handler::Replace`] receives no upstream value. Returning `None` falls
//!   back to the inner chain; returning `Some(v)` makes `v` the result and the
//!   inner chain is never invoked.
//! - [`Handler::Filter`] receives the already-evaluated inner result.
//! - [`Handler::Wrap`] receives the unevaluated continuation.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use xadmin_rs_core::{AdminError, AdminResult};
use xadmin_rs_template::Context;

use crate::plugin::AdminPlugin;
use crate::view::AdminView;

/// The default priority of a plugin handler. Lower runs further out.
pub const DEFAULT_PRIORITY: i32 = 10;

/// A typed extension-point key.
///
/// `T` is the value the extension point computes, `A` the argument every
/// link receives.
///
/// # Examples
///
/// ```
/// use xadmin_rs_admin::hooks::Hook;
/// use xadmin_rs_db::Record;
///
/// static GET_TITLE: Hook<String> = Hook::new("get_title");
/// static URL_FOR_RESULT: Hook<String, Record> = Hook::new("url_for_result");
///
/// assert_eq!(GET_TITLE.name(), "get_title");
/// assert_eq!(URL_FOR_RESULT.to_string(), "url_for_result");
/// ```
pub struct Hook<T, A = ()> {
    name: &'static str,
    _marker: PhantomData<fn(&A) -> T>,
}

impl<T, A> Hook<T, A> {
    /// Creates a key.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The extension point's name.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T, A> Clone for Hook<T, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, A> Copy for Hook<T, A> {}

impl<T, A> fmt::Debug for Hook<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hook").field(&self.name).finish()
    }
}

impl<T, A> fmt::Display for Hook<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ── Continuations ────────────────────────────────────────────────────

/// One link of a dispatch chain.
pub(crate) type Link<T, A> = Box<dyn Fn(&mut AdminView, &A, Next<'_, T, A>) -> AdminResult<T>>;

/// The view's own implementation at the bottom of a chain.
pub(crate) type Base<'a, T, A> = dyn FnMut(&mut AdminView, &A) -> AdminResult<T> + 'a;

/// The rest of a dispatch chain.
///
/// Calling [`Next::call`] runs every link further in and finally the base
/// implementation. Dropping it without calling skips them.
pub struct Next<'a, T, A> {
    rest: &'a [Link<T, A>],
    args: &'a A,
    base: &'a mut Base<'a, T, A>,
}

impl<'a, T, A> Next<'a, T, A> {
    /// Runs the inner chain.
    pub fn call(self, view: &mut AdminView) -> AdminResult<T> {
        run_chain(self.rest, view, self.args, self.base)
    }

    /// The argument the extension point was invoked with.
    pub const fn args(&self) -> &'a A {
        self.args
    }

    /// Number of links left before the base implementation.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

impl<T, A> fmt::Debug for Next<'_, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.rest.len())
            .finish_non_exhaustive()
    }
}

pub(crate) fn run_chain<'a, T, A>(
    links: &'a [Link<T, A>],
    view: &mut AdminView,
    args: &'a A,
    base: &'a mut Base<'a, T, A>,
) -> AdminResult<T> {
    match links.split_first() {
        Some((link, rest)) => link(view, args, Next { rest, args, base }),
        None => base(view, args),
    }
}

pub(crate) fn link<T, A, F>(f: F) -> Link<T, A>
where
    F: Fn(&mut AdminView, &A, Next<'_, T, A>) -> AdminResult<T> + 'static,
{
    Box::new(f)
}

// ── Plugin handlers ──────────────────────────────────────────────────

/// A plugin's implementation of one extension point.
///
/// The first argument is the plugin instance, borrowed for the call.
pub enum Handler<P, T, A = ()> {
    /// Ignores the upstream value. `None` falls back to the inner chain,
    /// `Some` replaces it without running the inner chain.
    Replace(fn(&P, &mut AdminView, &A) -> AdminResult<Option<T>>),
    /// Transforms the evaluated inner result.
    Filter(fn(&P, &mut AdminView, T, &A) -> AdminResult<T>),
    /// Receives the continuation and decides whether and when to call it.
    Wrap(fn(&P, &mut AdminView, &A, Next<'_, T, A>) -> AdminResult<T>),
}

impl<P, T, A> Clone for Handler<P, T, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P, T, A> Copy for Handler<P, T, A> {}

impl<P, T, A> fmt::Debug for Handler<P, T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Replace(_) => "Replace",
            Self::Filter(_) => "Filter",
            Self::Wrap(_) => "Wrap",
        };
        f.write_str(kind)
    }
}

/// A handler with its plugin type erased.
pub(crate) type PluginHookFn<T, A> =
    Arc<dyn Fn(&dyn AdminPlugin, &mut AdminView, &A, Next<'_, T, A>) -> AdminResult<T> + Send + Sync>;

fn plugin_hook_fn<T, A, F>(f: F) -> PluginHookFn<T, A>
where
    F: Fn(&dyn AdminPlugin, &mut AdminView, &A, Next<'_, T, A>) -> AdminResult<T>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

impl<P, T, A> Handler<P, T, A>
where
    P: AdminPlugin + 'static,
    T: 'static,
    A: 'static,
{
    pub(crate) fn erase(self, plugin_id: &str, hook: &'static str) -> PluginHookFn<T, A> {
        let handler = self;
        let plugin_id = plugin_id.to_string();
        plugin_hook_fn(move |plugin, view, args, next| {
            let Some(plugin) = plugin.as_any().downcast_ref::<P>() else {
                return Err(AdminError::IncorrectPluginArg(format!(
                    "plugin '{plugin_id}' was instantiated with a different type than its '{hook}' handler expects"
                )));
            };
            match handler {
                Self::Replace(f) => match f(plugin, view, args)? {
                    Some(value) => Ok(value),
                    None => next.call(view),
                },
                Self::Filter(f) => {
                    let inner = next.call(view)?;
                    f(plugin, view, inner, args)
                }
                Self::Wrap(f) => f(plugin, view, args, next),
            }
        })
    }
}

/// A registered handler: its priority plus the erased [`PluginHookFn`].
pub(crate) struct HookEntry {
    pub(crate) priority: i32,
    pub(crate) handler: Box<dyn Any + Send + Sync>,
}

impl HookEntry {
    /// Recovers the typed handler, failing when the handler was registered
    /// for a key with a different value or argument type.
    pub(crate) fn typed<T: 'static, A: 'static>(
        &self,
        plugin_id: &str,
        hook: &'static str,
    ) -> AdminResult<PluginHookFn<T, A>> {
        self.handler
            .downcast_ref::<PluginHookFn<T, A>>()
            .cloned()
            .ok_or_else(|| {
                AdminError::IncorrectPluginArg(format!(
                    "handler '{hook}' of plugin '{plugin_id}' does not match the signature of the extension point"
                ))
            })
    }
}

// ── Option overrides ─────────────────────────────────────────────────

/// A hook override declared by an option bundle.
pub(crate) type OptionHookFn<T, A> =
    Arc<dyn Fn(&mut AdminView, &A, Next<'_, T, A>) -> AdminResult<T> + Send + Sync>;

pub(crate) fn option_hook_fn<T, A, F>(f: F) -> OptionHookFn<T, A>
where
    F: Fn(&mut AdminView, &A, Next<'_, T, A>) -> AdminResult<T> + Send + Sync + 'static,
{
    Arc::new(f)
}

// ── Blocks ───────────────────────────────────────────────────────────

/// A plugin's contribution to a named template block.
///
/// A block may push fragments onto the shared node list or return one.
pub type BlockFn<P> = fn(&P, &mut AdminView, &Context, &mut Vec<String>) -> AdminResult<Option<String>>;

pub(crate) type ErasedBlockFn = Arc<
    dyn Fn(&dyn AdminPlugin, &mut AdminView, &Context, &mut Vec<String>) -> AdminResult<Option<String>>
        + Send
        + Sync,
>;

pub(crate) fn erase_block<P: AdminPlugin + 'static>(f: BlockFn<P>, plugin_id: &str, name: &str) -> ErasedBlockFn {
    let plugin_id = plugin_id.to_string();
    let name = name.to_string();
    Arc::new(
        move |plugin: &dyn AdminPlugin,
              view: &mut AdminView,
              context: &Context,
              nodes: &mut Vec<String>| {
            let plugin = plugin.as_any().downcast_ref::<P>().ok_or_else(|| {
                AdminError::IncorrectPluginArg(format!(
                    "block '{name}' of plugin '{plugin_id}' received a foreign plugin instance"
                ))
            })?;
            f(plugin, view, context, nodes)
        },
    )
}
