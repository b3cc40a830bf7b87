//! Registry of refresh-token callbacks fired after every successful rotation.

// std
use std::{
	panic::{self, AssertUnwindSafe},
	sync::Weak,
};
// self
use crate::{_prelude::*, obs};

type Callback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Default)]
struct Registry {
	next_id: u64,
	callbacks: BTreeMap<u64, Callback>,
}

/// Ordered set of callbacks that receive each newly rotated refresh token.
#[derive(Clone, Default)]
pub struct CallbackRegistry(Arc<Mutex<Registry>>);
impl CallbackRegistry {
	/// Registers `callback`; it fires after every rotation until the handle is removed.
	pub fn register<F>(&self, callback: F) -> CallbackHandle
	where
		F: 'static + Fn(&str) + Send + Sync,
	{
		let mut registry = self.0.lock();
		let id = registry.next_id;

		registry.next_id += 1;
		registry.callbacks.insert(id, Arc::new(callback));

		CallbackHandle { id, registry: Arc::downgrade(&self.0) }
	}

	/// Number of registered callbacks.
	pub fn len(&self) -> usize {
		self.0.lock().callbacks.len()
	}

	/// Returns `true` when no callback is registered.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Invokes every callback, in registration order, with `refresh_token`.
	///
	/// The registry lock is released before the first call, so callbacks may register or
	/// remove callbacks themselves. A panicking callback is logged and skipped.
	pub(crate) fn notify(&self, refresh_token: &str) -> usize {
		let callbacks = self
			.0
			.lock()
			.callbacks
			.iter()
			.map(|(id, callback)| (*id, Arc::clone(callback)))
			.collect::<Vec<_>>();

		for (id, callback) in &callbacks {
			if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(refresh_token))) {
				let message = payload
					.downcast_ref::<&str>()
					.map(|s| (*s).to_owned())
					.or_else(|| payload.downcast_ref::<String>().cloned())
					.unwrap_or_else(|| "unknown panic".into());

				obs::callback_panicked(*id, &message);
			}
		}

		callbacks.len()
	}
}
impl Debug for CallbackRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CallbackRegistry").field("len", &self.len()).finish()
	}
}

/// Deregistration handle returned by
/// [`Session::add_refresh_token_callback`](crate::session::Session::add_refresh_token_callback).
///
/// Dropping the handle keeps the callback registered; call [`CallbackHandle::remove`] to stop
/// receiving tokens.
#[derive(Clone, Debug)]
pub struct CallbackHandle {
	id: u64,
	registry: Weak<Mutex<Registry>>,
}
impl CallbackHandle {
	/// Removes the callback. Removing twice, or after the session is gone, is a no-op.
	pub fn remove(&self) {
		if let Some(registry) = self.registry.upgrade() {
			registry.lock().callbacks.remove(&self.id);
		}
	}
}
