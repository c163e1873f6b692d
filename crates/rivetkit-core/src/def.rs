//! Actor definitions (spec §3, §4.I): the declarative shape registered
//! for a name. State/input/vars stay `serde_json::Value` at this
//! boundary, so one `ActorDef` type serves every actor kind — no
//! per-kind monomorphization, no `dyn ActorKind` erasure needed at the
//! registry boundary.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::BoxedError;
use crate::instance::connection::ConnCtx;
use crate::instance::context::ActionCtx;
use crate::instance::raw::{RawRequest, RawResponse, RawWebSocket};

pub type ActionFn =
	Box<dyn Fn(ActionCtx, Vec<Value>) -> BoxFuture<'static, Result<Value, BoxedError>> + Send + Sync>;
pub type CreateFn =
	Box<dyn Fn(ActionCtx, Option<Value>) -> BoxFuture<'static, Result<Value, BoxedError>> + Send + Sync>;
pub type CreateVarsFn =
	Box<dyn Fn(ActionCtx) -> BoxFuture<'static, Result<Value, BoxedError>> + Send + Sync>;
pub type LifecycleFn = Box<dyn Fn(ActionCtx) -> BoxFuture<'static, Result<(), BoxedError>> + Send + Sync>;
pub type BeforeConnectFn =
	Box<dyn Fn(ActionCtx, Value) -> BoxFuture<'static, Result<Value, BoxedError>> + Send + Sync>;
pub type ConnLifecycleFn = Box<dyn Fn(ConnCtx) -> BoxFuture<'static, Result<(), BoxedError>> + Send + Sync>;
pub type RawRequestFn =
	Box<dyn Fn(ActionCtx, RawRequest) -> BoxFuture<'static, Result<RawResponse, BoxedError>> + Send + Sync>;
pub type RawWebSocketFn =
	Box<dyn Fn(ActionCtx, Arc<dyn RawWebSocket>) -> BoxFuture<'static, Result<(), BoxedError>> + Send + Sync>;
/// A workflow body (spec §4.F): composed of awaited `WorkflowCtx` primitives,
/// replayed from the top on every resume. Returns the primitives' own
/// control type rather than `Result<_, BoxedError>` -- suspension
/// ([`crate::workflow::WorkflowControl::Suspended`]) is the ordinary way a
/// run yields, not a failure.
pub type RunFn = Box<
	dyn Fn(ActionCtx, Arc<crate::workflow::WorkflowCtx>) -> BoxFuture<'static, Result<(), crate::workflow::WorkflowControl>>
		+ Send
		+ Sync,
>;

/// The registered behavior for one actor name. Built with [`ActorDefBuilder`].
pub struct ActorDef {
	pub name: String,
	pub on_create: Option<CreateFn>,
	/// Rebuilds `vars` (spec §3 "vars constructor") on every cold start --
	/// fresh create and wake alike -- since vars never persist across sleep.
	pub on_create_vars: Option<CreateVarsFn>,
	pub on_start: Option<LifecycleFn>,
	pub on_wake: Option<LifecycleFn>,
	pub on_before_connect: Option<BeforeConnectFn>,
	pub on_connect: Option<ConnLifecycleFn>,
	pub on_disconnect: Option<ConnLifecycleFn>,
	pub on_before_destroy: Option<LifecycleFn>,
	pub on_sleep: Option<LifecycleFn>,
	/// Handles a non-RPC HTTP request routed to this actor (spec §4.D "raw
	/// HTTP"); the envelope-based action/queue routes bypass this entirely.
	pub on_request: Option<RawRequestFn>,
	/// Handles a non-RPC WebSocket connection (spec §4.D "raw WebSocket");
	/// mutually exclusive in practice with `onBeforeConnect`/`onConnect` --
	/// a raw socket never goes through envelope negotiation.
	pub on_web_socket: Option<RawWebSocketFn>,
	/// An optional long-running workflow body (spec §4.F), resident in its
	/// own task for the instance's whole awake lifetime.
	pub run: Option<RunFn>,
	pub actions: HashMap<String, ActionFn>,
	pub event_names: Vec<String>,
	pub queue_names: Vec<String>,
	/// Milliseconds of no activity before the instance becomes eligible to
	/// sleep; `None` uses [`crate::config::Config::default_sleep_timeout_ms`].
	pub sleep_timeout_ms: Option<u64>,
}

pub struct ActorDefBuilder {
	def: ActorDef,
}

impl ActorDefBuilder {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			def: ActorDef {
				name: name.into(),
				on_create: None,
				on_create_vars: None,
				on_start: None,
				on_wake: None,
				on_before_connect: None,
				on_connect: None,
				on_disconnect: None,
				on_before_destroy: None,
				on_sleep: None,
				on_request: None,
				on_web_socket: None,
				run: None,
				actions: HashMap::new(),
				event_names: Vec::new(),
				queue_names: Vec::new(),
				sleep_timeout_ms: None,
			},
		}
	}

	pub fn on_create<F>(mut self, f: F) -> Self
	where
		F: Fn(ActionCtx, Option<Value>) -> BoxFuture<'static, Result<Value, BoxedError>> + Send + Sync + 'static,
	{
		self.def.on_create = Some(Box::new(f));
		self
	}

	/// Rebuilds `vars` from `state`/`input` on every cold start. Runs before
	/// `onCreate`/`onStart`/`onWake` so those hooks see the fresh value.
	pub fn create_vars<F>(mut self, f: F) -> Self
	where
		F: Fn(ActionCtx) -> BoxFuture<'static, Result<Value, BoxedError>> + Send + Sync + 'static,
	{
		self.def.on_create_vars = Some(Box::new(f));
		self
	}

	pub fn on_start<F>(mut self, f: F) -> Self
	where
		F: Fn(ActionCtx) -> BoxFuture<'static, Result<(), BoxedError>> + Send + Sync + 'static,
	{
		self.def.on_start = Some(Box::new(f));
		self
	}

	pub fn on_wake<F>(mut self, f: F) -> Self
	where
		F: Fn(ActionCtx) -> BoxFuture<'static, Result<(), BoxedError>> + Send + Sync + 'static,
	{
		self.def.on_wake = Some(Box::new(f));
		self
	}

	pub fn on_before_connect<F>(mut self, f: F) -> Self
	where
		F: Fn(ActionCtx, Value) -> BoxFuture<'static, Result<Value, BoxedError>> + Send + Sync + 'static,
	{
		self.def.on_before_connect = Some(Box::new(f));
		self
	}

	pub fn on_connect<F>(mut self, f: F) -> Self
	where
		F: Fn(ConnCtx) -> BoxFuture<'static, Result<(), BoxedError>> + Send + Sync + 'static,
	{
		self.def.on_connect = Some(Box::new(f));
		self
	}

	pub fn on_disconnect<F>(mut self, f: F) -> Self
	where
		F: Fn(ConnCtx) -> BoxFuture<'static, Result<(), BoxedError>> + Send + Sync + 'static,
	{
		self.def.on_disconnect = Some(Box::new(f));
		self
	}

	pub fn on_before_destroy<F>(mut self, f: F) -> Self
	where
		F: Fn(ActionCtx) -> BoxFuture<'static, Result<(), BoxedError>> + Send + Sync + 'static,
	{
		self.def.on_before_destroy = Some(Box::new(f));
		self
	}

	/// Runs just before an idle instance is evicted from memory (spec §4.D
	/// "hibernation"), after eligibility is confirmed but before `state` is
	/// flushed one last time. Unlike [`Self::on_before_destroy`], the actor
	/// is not deleted -- the next `onWake` finds the same `state`.
	pub fn on_sleep<F>(mut self, f: F) -> Self
	where
		F: Fn(ActionCtx) -> BoxFuture<'static, Result<(), BoxedError>> + Send + Sync + 'static,
	{
		self.def.on_sleep = Some(Box::new(f));
		self
	}

	pub fn on_request<F>(mut self, f: F) -> Self
	where
		F: Fn(ActionCtx, RawRequest) -> BoxFuture<'static, Result<RawResponse, BoxedError>> + Send + Sync + 'static,
	{
		self.def.on_request = Some(Box::new(f));
		self
	}

	pub fn on_web_socket<F>(mut self, f: F) -> Self
	where
		F: Fn(ActionCtx, Arc<dyn RawWebSocket>) -> BoxFuture<'static, Result<(), BoxedError>> + Send + Sync + 'static,
	{
		self.def.on_web_socket = Some(Box::new(f));
		self
	}

	/// Registers the actor's `run` handler. Spawned once on every cold start
	/// (fresh create or wake), resumed from history rather than re-created.
	pub fn run<F>(mut self, f: F) -> Self
	where
		F: Fn(ActionCtx, Arc<crate::workflow::WorkflowCtx>) -> BoxFuture<'static, Result<(), crate::workflow::WorkflowControl>>
			+ Send
			+ Sync
			+ 'static,
	{
		self.def.run = Some(Box::new(f));
		self
	}

	pub fn action<F>(mut self, name: impl Into<String>, f: F) -> Self
	where
		F: Fn(ActionCtx, Vec<Value>) -> BoxFuture<'static, Result<Value, BoxedError>> + Send + Sync + 'static,
	{
		self.def.actions.insert(name.into(), Box::new(f));
		self
	}

	pub fn event(mut self, name: impl Into<String>) -> Self {
		self.def.event_names.push(name.into());
		self
	}

	pub fn queue(mut self, name: impl Into<String>) -> Self {
		self.def.queue_names.push(name.into());
		self
	}

	pub fn sleep_timeout_ms(mut self, ms: u64) -> Self {
		self.def.sleep_timeout_ms = Some(ms);
		self
	}

	pub fn build(self) -> ActorDef {
		self.def
	}
}

impl ActorDef {
	pub fn builder(name: impl Into<String>) -> ActorDefBuilder {
		ActorDefBuilder::new(name)
	}
}
