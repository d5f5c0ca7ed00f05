//! The bridge instance
//!
//! A [`Bridge`] ties one managed runtime to the native side: it owns the
//! handle table, the signature registry, the runtime category codecs and
//! the peer class chains. Generated glue reaches it through the
//! process-wide instance installed with [`Bridge::install`].

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::any::CodecTable;
use crate::classes;
use crate::config::BridgeConfig;
use crate::context::ManagedEnv;
use crate::error::{BridgeError, BridgeResult, ThrownError};
use crate::handle::HandleTable;
use crate::options::MarshalOptions;
use crate::polymorph::ClassChain;
use crate::refs::{GlobalRef, LocalRef};
use crate::registry::{ClassSignature, SignatureRegistry};
use crate::value::{ManagedValue, ObjRef};

static GLOBAL: OnceCell<Arc<Bridge>> = OnceCell::new();

/// Cross-runtime object bridge
pub struct Bridge {
    env: Arc<dyn ManagedEnv>,
    handles: HandleTable,
    registry: SignatureRegistry,
    codecs: CodecTable,
    pub(crate) peer_classes: DashMap<TypeId, Arc<ClassChain>>,
    config: BridgeConfig,
    default_options: MarshalOptions,
    me: Weak<Bridge>,
}

impl Bridge {
    /// Create a bridge over `env` and bind the bridge support natives
    pub fn new(env: Arc<dyn ManagedEnv>, config: BridgeConfig) -> BridgeResult<Arc<Self>> {
        let default_options = config.default_options()?;
        let bridge = Arc::new_cyclic(|me| Self {
            env,
            handles: HandleTable::new(config.strict_release),
            registry: SignatureRegistry::new(),
            codecs: CodecTable::with_defaults(),
            peer_classes: DashMap::new(),
            config,
            default_options,
            me: me.clone(),
        });
        crate::lifecycle::register_support(&bridge)?;
        tracing::debug!("bridge created");
        Ok(bridge)
    }

    /// Make `bridge` the process-wide instance
    pub fn install(bridge: Arc<Bridge>) -> BridgeResult<()> {
        GLOBAL.set(bridge).map_err(|_| BridgeError::AlreadyInstalled)
    }

    /// The process-wide instance
    pub fn global() -> BridgeResult<&'static Arc<Bridge>> {
        GLOBAL.get().ok_or(BridgeError::NotInstalled)
    }

    /// The process-wide instance, if installed
    pub fn try_global() -> Option<&'static Arc<Bridge>> {
        GLOBAL.get()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The managed runtime
    #[inline]
    pub fn env(&self) -> &dyn ManagedEnv {
        &*self.env
    }

    /// The managed runtime, shared
    #[inline]
    pub fn env_arc(&self) -> &Arc<dyn ManagedEnv> {
        &self.env
    }

    /// Peer handle table
    #[inline]
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Signature registry
    #[inline]
    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    /// Runtime category codecs
    #[inline]
    pub fn codecs(&self) -> &CodecTable {
        &self.codecs
    }

    /// Configuration
    #[inline]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Options glue passes when it has nothing more specific
    #[inline]
    pub fn default_options(&self) -> MarshalOptions {
        self.default_options
    }

    /// Weak self reference, for natives bound to this bridge
    pub fn weak(&self) -> Weak<Bridge> {
        self.me.clone()
    }

    /// Memoized signature of a managed class
    pub fn describe(&self, class: &str) -> BridgeResult<Arc<ClassSignature>> {
        self.registry.describe(&*self.env, class)
    }

    pub(crate) fn trace_crossing(&self, direction: &'static str, class: &str, name: &str) {
        if self.config.trace_crossings {
            tracing::trace!(direction, class, name, "boundary crossing");
        }
    }

    // ========================================================================
    // References
    // ========================================================================

    /// Take ownership of a local reference
    #[inline]
    pub fn local(&self, obj: ObjRef) -> LocalRef<'_> {
        LocalRef::new(&*self.env, obj)
    }

    /// Take ownership of the object in a returned value slot
    pub fn adopt(&self, value: ManagedValue) -> Option<LocalRef<'_>> {
        value.as_object().flatten().map(|obj| self.local(obj))
    }

    /// Global reference to the referent of `obj`
    pub fn global_ref(&self, obj: ObjRef) -> BridgeResult<GlobalRef> {
        GlobalRef::new(self.env.clone(), obj)
    }

    /// Whether `obj` is an instance of the class at `class`
    pub fn is_instance_of(&self, obj: ObjRef, class: &str) -> BridgeResult<bool> {
        let signature = self.describe(class)?;
        self.env.is_instance_of(obj, signature.class())
    }

    /// Runtime class path of `obj`
    pub fn class_name_of(&self, obj: ObjRef) -> BridgeResult<String> {
        let class = self.env.class_of(obj)?;
        Ok(self.env.class_name(class))
    }

    // ========================================================================
    // Strings
    // ========================================================================

    /// Allocate a managed string
    pub fn new_string(&self, s: &str) -> BridgeResult<LocalRef<'_>> {
        Ok(self.local(self.env.new_string(s)?))
    }

    /// Read a managed string
    pub fn read_string(&self, obj: ObjRef) -> BridgeResult<String> {
        self.env.read_string(obj)
    }

    // ========================================================================
    // Exceptions
    // ========================================================================

    /// Turn a pending managed exception into [`BridgeError::Thrown`]
    pub fn check_exception(&self) -> BridgeResult<()> {
        match self.env.take_exception() {
            None => Ok(()),
            Some(throwable) => {
                let throwable = self.local(throwable);
                Err(BridgeError::Thrown(self.thrown_from(&throwable)?))
            }
        }
    }

    /// Describe a managed throwable, keeping a global reference to it
    pub fn thrown_from(&self, throwable: &LocalRef<'_>) -> BridgeResult<ThrownError> {
        let class_name = self.class_name_of(throwable.obj())?;
        let signature = self.describe(classes::THROWABLE)?;
        let (name, sig) = classes::THROWABLE_GET_MESSAGE;
        let get_message = signature.method(&*self.env, name, sig)?;
        let value = self.env.call_method(throwable.obj(), get_message, &[])?;
        let message = match self.env.take_exception() {
            Some(nested) => {
                self.env.delete_local_ref(nested);
                None
            }
            None => match self.adopt(value) {
                Some(message) => Some(self.read_string(message.obj())?),
                None => None,
            },
        };
        let global = self.global_ref(throwable.obj())?;
        Ok(ThrownError::from_throwable(class_name, message, global))
    }

    /// Managed throwable for a failure: the original when it came from the
    /// managed side, otherwise a new instance of its class with its message
    pub fn throwable_for(&self, error: &ThrownError) -> BridgeResult<LocalRef<'_>> {
        if let Some(original) = error.throwable() {
            return Ok(self.local(self.env.new_local_ref(original.obj())?));
        }
        self.new_throwable(error.class_name(), error.message().unwrap_or(""))
    }

    /// Construct a throwable of `class` with a message
    pub fn new_throwable(&self, class: &str, message: &str) -> BridgeResult<LocalRef<'_>> {
        let message = self.new_string(message)?;
        self.new_object_raw(class, classes::MESSAGE_CTOR, &[message.value()])
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("handles", &self.handles)
            .field("registry", &self.registry)
            .field("peer_classes", &self.peer_classes.len())
            .field("config", &self.config)
            .finish()
    }
}
