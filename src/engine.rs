//=========================================================================
// Visor Engine
//
// Main entry point and coordinator for the engine.
//
// Architecture:
// ```text
//     EngineBuilder  ──build()──>  Engine  ──run()──>  [Runtime]
//         │                          │
//         ├─ with_config()           ├─ init(|ctx| ..)
//         ├─ with_frame_rate()       │    registries, first scene
//         ├─ with_drain_cap()        │
//         ├─ with_channel_capacity() └─ run() / run_headless()
//         ├─ with_resolver()              spawns render thread
//         └─ with_releaser()              runs platform
//                                         blocks until exit
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use std::io::Read;
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{error, info, warn};

//=== Internal Dependencies ===============================================

use crate::config::EngineConfig;
use crate::core::markup::{AttributeRegistry, BuildError, ObjectFactory, SceneBuilder};
use crate::core::platform_bridge::{HostEvent, PlatformError};
use crate::core::reclaim::{NativeRegistry, NativeReleaser, Reclaimer};
use crate::core::resource::{NullResolver, ResourceResolver};
use crate::core::scene::{Arguments, SceneLifecycle, SharedScene};
use crate::core::scheduler::FrameScheduler;
use crate::core::tasks::{TaskQueue, TaskSubmitter};
use crate::core::RenderLoop;
use crate::platform::Platform;

//=== EngineBuilder =======================================================

/// Builder for configuring and constructing an [`Engine`].
///
/// # Default Values
///
/// - **Frame rate**: 60.0 cycles per second
/// - **Drain cap**: 16 deferred actions per cycle
/// - **Channel capacity**: 128 host events
/// - **Resolver**: [`NullResolver`] (every reference fails to resolve)
/// - **Releaser**: logs released handles
///
/// # Examples
///
/// ```no_run
/// use visor_engine::EngineBuilder;
/// use visor_engine::core::scene::Arguments;
///
/// let markup = r#"<scene><object name="panel" width="1"/></scene>"#;
///
/// EngineBuilder::new()
///     .with_frame_rate(72.0)
///     .build()
///     .try_init(|ctx| ctx.set_scene_from_markup(markup.as_bytes(), Arguments::new()).map(|_| ()))
///     .expect("scene markup")
///     .run()
///     .expect("platform");
/// ```
pub struct EngineBuilder {
    config: EngineConfig,
    resolver: Arc<dyn ResourceResolver>,
    reclaimer: Reclaimer,
}

impl EngineBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            resolver: Arc::new(NullResolver),
            reclaimer: Reclaimer::default(),
        }
    }

    /// Replaces every setting with `config`.
    ///
    /// # Panics
    ///
    /// Panics if `config` fails [`EngineConfig::validate`].
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        if let Err(e) = config.validate() {
            panic!("Invalid engine config: {}", e);
        }
        self.config = config;
        self
    }

    /// Sets the target render cycles per second.
    ///
    /// Default: 60.0
    ///
    /// # Panics
    ///
    /// Panics if `frame_rate <= 0.0`.
    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        assert!(frame_rate > 0.0, "Frame rate must be positive, got {}", frame_rate);
        self.config.frame_rate = frame_rate;
        self
    }

    /// Sets how many deferred actions run per cycle. The rest wait for
    /// the next cycle in submission order.
    ///
    /// Default: 16
    ///
    /// # Panics
    ///
    /// Panics if `cap == 0`.
    pub fn with_drain_cap(mut self, cap: usize) -> Self {
        assert!(cap > 0, "Drain cap must be positive");
        self.config.drain_cap = cap;
        self
    }

    /// Sets the channel capacity for host → render thread events.
    ///
    /// Default: 128
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "Channel capacity must be positive");
        self.config.channel_capacity = capacity;
        self
    }

    /// Sets the host resolver for `@kind/name` references in markup.
    pub fn with_resolver<R: ResourceResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Sets the callback that frees native handles on the render thread.
    pub fn with_releaser<R: NativeReleaser + 'static>(mut self, releaser: R) -> Self {
        self.reclaimer.set_releaser(releaser);
        self
    }

    /// Builds the engine instance.
    pub fn build(self) -> Engine {
        let config = self.config;
        info!(
            "Building engine (frame rate: {}, drain cap: {}, channel: {})",
            config.frame_rate, config.drain_cap, config.channel_capacity
        );

        let (host_sender, receiver) = bounded(config.channel_capacity);
        let lifecycle = Arc::new(SceneLifecycle::new());
        let scheduler = FrameScheduler::new(
            TaskQueue::new(),
            self.reclaimer,
            Arc::clone(&lifecycle),
            config.drain_cap,
        );

        let context = EngineContext {
            factory: Arc::new(ObjectFactory::new()),
            attributes: Arc::new(AttributeRegistry::with_defaults()),
            resolver: self.resolver,
            natives: scheduler.natives(),
            submitter: scheduler.submitter(),
            lifecycle,
            host_sender,
        };

        Engine {
            context,
            scheduler,
            receiver,
            config,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

//=== EngineContext =======================================================

/// Process-scoped engine services handed to application code.
///
/// Registries are mutable until a [`SceneBuilder`] is taken from them;
/// builders keep the snapshot they were created with.
pub struct EngineContext {
    factory: Arc<ObjectFactory>,
    attributes: Arc<AttributeRegistry>,
    resolver: Arc<dyn ResourceResolver>,
    natives: NativeRegistry,
    lifecycle: Arc<SceneLifecycle>,
    submitter: TaskSubmitter,
    host_sender: Sender<HostEvent>,
}

impl EngineContext {
    //--- Registries -------------------------------------------------------

    pub fn factory(&self) -> &ObjectFactory {
        &self.factory
    }

    pub fn factory_mut(&mut self) -> &mut ObjectFactory {
        Arc::make_mut(&mut self.factory)
    }

    pub fn attributes(&self) -> &AttributeRegistry {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeRegistry {
        Arc::make_mut(&mut self.attributes)
    }

    pub fn set_resolver<R: ResourceResolver + 'static>(&mut self, resolver: R) {
        self.resolver = Arc::new(resolver);
    }

    //--- Shared Services --------------------------------------------------

    pub fn natives(&self) -> &NativeRegistry {
        &self.natives
    }

    pub fn lifecycle(&self) -> &Arc<SceneLifecycle> {
        &self.lifecycle
    }

    /// Handle for running work on the render thread. Cheap to clone.
    pub fn submitter(&self) -> TaskSubmitter {
        self.submitter.clone()
    }

    /// Sender feeding key, pose and shutdown events to the render loop.
    pub fn host_events(&self) -> Sender<HostEvent> {
        self.host_sender.clone()
    }

    //--- Scenes -----------------------------------------------------------

    /// A builder over the current registries.
    pub fn scene_builder(&self) -> SceneBuilder {
        SceneBuilder::new(
            Arc::clone(&self.factory),
            Arc::clone(&self.attributes),
            Arc::clone(&self.resolver),
            self.natives.clone(),
        )
    }

    /// Builds a scene from markup, adds `arguments` to it and makes it the
    /// active scene.
    ///
    /// Arguments passed here override root attributes of the same key.
    /// On failure the active scene is left untouched.
    pub fn set_scene_from_markup<R: Read>(
        &self,
        markup: R,
        arguments: Arguments,
    ) -> Result<SharedScene, BuildError> {
        let mut scene = self.scene_builder().build(markup, None)?;
        for (key, value) in arguments.iter() {
            scene.arguments_mut().insert(key, value);
        }

        let shared = scene.into_shared();
        self.lifecycle.set_scene(Arc::clone(&shared));
        Ok(shared)
    }
}

//=== Engine ==============================================================

/// Visor runtime.
///
/// # Architecture
///
/// ```text
/// Engine (Main Thread)
///   ├─► RenderLoop (Render Thread @ frame rate)
///   │     └─► FrameScheduler: DRAIN → ADVANCE → RECLAIM
///   │
///   └─► Platform (Event Loop)
///         └─► Window, key gestures, preview head pose
///
/// Communication: crossbeam channel (HostEvent)
/// ```
pub struct Engine {
    context: EngineContext,
    scheduler: FrameScheduler,
    receiver: Receiver<HostEvent>,
    config: EngineConfig,
}

impl Engine {
    //--- Initialization ---------------------------------------------------

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut EngineContext {
        &mut self.context
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Configures registries and scenes before the engine starts.
    pub fn init<F>(mut self, init_fn: F) -> Self
    where
        F: FnOnce(&mut EngineContext),
    {
        info!("Initializing engine context");
        init_fn(&mut self.context);
        info!("Engine initialization complete");
        self
    }

    /// Like [`Engine::init`], for setup that can fail.
    pub fn try_init<F, E>(mut self, init_fn: F) -> Result<Self, E>
    where
        F: FnOnce(&mut EngineContext) -> Result<(), E>,
    {
        info!("Initializing engine context");
        init_fn(&mut self.context)?;
        info!("Engine initialization complete");
        Ok(self)
    }

    //--- Execution --------------------------------------------------------

    /// Starts the runtime and blocks until the window is closed.
    ///
    /// # Lifecycle
    ///
    /// 1. Spawns the render thread at the configured frame rate
    /// 2. Runs the platform event loop (blocks here)
    /// 3. On window close: platform sends `Shutdown` → render thread exits
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if the render thread cannot be spawned or
    /// panics, or if the event loop fails.
    pub fn run(self) -> Result<(), PlatformError> {
        info!("Starting engine runtime (frame rate: {})", self.config.frame_rate);

        let Engine {
            context,
            scheduler,
            receiver,
            config,
        } = self;

        //--- 1. Spawn the render thread ----------------------------------
        let render = RenderLoop::new(
            scheduler,
            receiver,
            config.frame_rate,
            config.max_host_events_per_frame,
        );
        let render_handle = render.spawn().map_err(PlatformError::RenderThread)?;
        info!("Render thread spawned");

        //--- 2. Launch the platform subsystem -----------------------------
        let platform = Platform::new(context.host_events(), &config);
        info!("Platform initialized, entering event loop");

        let platform_result = platform.run();
        if let Err(e) = &platform_result {
            error!("Platform error: {}", e);
            // The render thread only stops on Shutdown or disconnect.
            if context.host_sender.send(HostEvent::Shutdown).is_err() {
                warn!("Render thread already gone");
            }
        }
        drop(context);

        info!("Platform event loop exited");

        //--- 3. Cleanup: Wait for render thread to terminate --------------
        let frames = match render_handle.join() {
            Ok(frames) => frames,
            Err(e) => {
                error!("Render thread panicked: {:?}", e);
                platform_result?;
                return Err(PlatformError::RenderThreadPanicked);
            }
        };

        info!("Engine shutdown complete after {} frame(s)", frames);
        platform_result
    }

    /// Runs the render loop on the calling thread without a window.
    ///
    /// Returns the number of frames rendered once `HostEvent::Shutdown`
    /// arrives or every sender from [`EngineContext::host_events`] is gone.
    pub fn run_headless(self) -> u64 {
        info!("Starting headless runtime (frame rate: {})", self.config.frame_rate);

        let Engine {
            context,
            scheduler,
            receiver,
            config,
        } = self;
        drop(context);

        RenderLoop::new(
            scheduler,
            receiver,
            config.frame_rate,
            config.max_host_events_per_frame,
        )
        .run()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::{KeyCode, KeyEvent};
    use crate::core::markup::TypeResolutionError;
    use crate::core::scene::{Behavior, SceneObject};
    use std::any::Any;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    //=====================================================================
    // EngineBuilder Tests
    //=====================================================================

    #[test]
    fn builder_defaults() {
        let builder = EngineBuilder::new();
        assert_eq!(builder.config, EngineConfig::default());
    }

    #[test]
    fn builder_with_frame_rate() {
        let builder = EngineBuilder::new().with_frame_rate(120.0);
        assert_eq!(builder.config.frame_rate, 120.0);
    }

    #[test]
    #[should_panic(expected = "Frame rate must be positive")]
    fn builder_with_frame_rate_panics_on_zero() {
        EngineBuilder::new().with_frame_rate(0.0);
    }

    #[test]
    #[should_panic(expected = "Frame rate must be positive")]
    fn builder_with_frame_rate_panics_on_negative() {
        EngineBuilder::new().with_frame_rate(-60.0);
    }

    #[test]
    #[should_panic(expected = "Drain cap must be positive")]
    fn builder_with_drain_cap_panics_on_zero() {
        EngineBuilder::new().with_drain_cap(0);
    }

    #[test]
    #[should_panic(expected = "Channel capacity must be positive")]
    fn builder_with_channel_capacity_panics_on_zero() {
        EngineBuilder::new().with_channel_capacity(0);
    }

    #[test]
    #[should_panic(expected = "Invalid engine config")]
    fn builder_rejects_invalid_config() {
        let config = EngineConfig {
            double_tap_ms: 900,
            ..EngineConfig::default()
        };
        EngineBuilder::new().with_config(config);
    }

    #[test]
    fn builder_fluent_api_chaining() {
        let engine = EngineBuilder::new()
            .with_frame_rate(90.0)
            .with_drain_cap(4)
            .with_channel_capacity(256)
            .build();

        assert_eq!(engine.config().frame_rate, 90.0);
        assert_eq!(engine.config().channel_capacity, 256);
        assert_eq!(engine.scheduler.drain_cap(), 4);
    }

    //=====================================================================
    // EngineContext Tests
    //=====================================================================

    #[derive(Default)]
    struct Spinner;

    impl Behavior for Spinner {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn init_registers_types_used_by_markup() {
        let engine = EngineBuilder::new().build().init(|ctx| {
            ctx.factory_mut().register_object("Spinner", Spinner::default);
        });

        let scene = engine
            .context()
            .set_scene_from_markup(
                r#"<scene><object class="Spinner" name="s"/></scene>"#.as_bytes(),
                Arguments::new(),
            )
            .unwrap();

        let scene = scene.lock();
        let spinner: &SceneObject = scene.find_by_name("s").unwrap();
        assert!(spinner.behavior::<Spinner>().is_some());
    }

    #[test]
    fn set_scene_from_markup_activates_scene_with_arguments() {
        let engine = EngineBuilder::new().build();
        let ctx = engine.context();

        let arguments: Arguments = [("level", "2"), ("mode", "override")].into_iter().collect();
        let scene = ctx
            .set_scene_from_markup(r#"<scene mode="markup" title="Lobby"/>"#.as_bytes(), arguments)
            .unwrap();

        assert!(Arc::ptr_eq(&ctx.lifecycle().current().unwrap(), &scene));

        let scene = scene.lock();
        assert!(scene.is_active());
        assert_eq!(scene.arguments().get("level"), Some("2"));
        assert_eq!(scene.arguments().get("mode"), Some("override"));
        assert_eq!(scene.arguments().get("title"), Some("Lobby"));
    }

    #[test]
    fn failed_markup_keeps_current_scene() {
        let engine = EngineBuilder::new().build();
        let ctx = engine.context();

        let first = ctx
            .set_scene_from_markup("<scene/>".as_bytes(), Arguments::new())
            .unwrap();
        let result =
            ctx.set_scene_from_markup(r#"<scene><object class="Missing"/></scene>"#.as_bytes(), Arguments::new());

        assert!(matches!(
            result,
            Err(BuildError::TypeResolution(TypeResolutionError::Unknown { .. }))
        ));
        assert!(Arc::ptr_eq(&ctx.lifecycle().current().unwrap(), &first));
    }

    #[test]
    fn builders_keep_their_registry_snapshot() {
        let mut engine = EngineBuilder::new().build();
        let before = engine.context().scene_builder();

        engine
            .context_mut()
            .factory_mut()
            .register_object("Spinner", Spinner::default);

        let markup = r#"<scene><object class="Spinner"/></scene>"#;
        assert!(before.build_str(markup, None).is_err());
        assert!(engine.context().scene_builder().build_str(markup, None).is_ok());
    }

    //=====================================================================
    // Runtime Tests
    //=====================================================================

    #[test]
    fn run_headless_drains_actions_until_shutdown() {
        let engine = EngineBuilder::new().with_frame_rate(240.0).build();
        let submitter = engine.context().submitter();
        let host = engine.context().host_events();

        let ran = Arc::new(AtomicU32::new(0));
        for _ in 0..3 {
            let ran = Arc::clone(&ran);
            submitter
                .submit(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        host.send(HostEvent::Key(KeyEvent::down(KeyCode::Enter))).unwrap();

        // Shutdown from a deferred action, after the three above.
        submitter
            .submit(move || {
                let _ = host.send(HostEvent::Shutdown);
            })
            .unwrap();

        let runner = thread::spawn(move || engine.run_headless());

        let frames = runner.join().unwrap();
        assert!(frames >= 1);
        assert_eq!(ran.load(Ordering::SeqCst), 3);
    }
}
