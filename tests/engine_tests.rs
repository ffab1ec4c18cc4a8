use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use shaderjit::{
    CompileError, CompileStrategy, CompiledShader, JitConfig, JitEngine, JitError,
    MAX_PROGRAM_CODE_LENGTH, ProgramIdentity, RunOutcome, ShaderCompiler, SkipReason, TitleConfig,
    TitleOverrides,
};

// First code word the test compiler refuses to translate.
const BAD_OPCODE: u32 = 0xdead_0000;
// First code word that makes the test compiler panic mid-translation.
const PANIC_OPCODE: u32 = 0xdead_0001;

// Run with RUST_LOG=shaderjit=debug to watch cache traffic.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

struct RecordShader {
    tag: u32,
}

impl CompiledShader for RecordShader {
    type State = Vec<(u32, usize)>;

    fn run(&self, state: &mut Self::State, entry_point: usize) {
        state.push((self.tag, entry_point));
    }
}

/// Counts compile invocations; optionally sleeps to widen race windows.
struct CountingCompiler {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingCompiler {
    fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }
}

impl ShaderCompiler for CountingCompiler {
    type Shader = RecordShader;

    fn compile(&self, program: &ProgramIdentity) -> Result<RecordShader, CompileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let tag = program.code().first().copied().unwrap_or(0);
        if tag == BAD_OPCODE {
            return Err(CompileError::MalformedProgram("unknown opcode".into()));
        }
        if tag == PANIC_OPCODE {
            panic!("register allocator overflow");
        }
        Ok(RecordShader { tag })
    }
}

fn program(tag: u32) -> ProgramIdentity {
    ProgramIdentity::new(vec![tag, 0x0800_0001, 0x2400_0042], vec![0x0000_036eu32])
}

fn inline_config() -> JitConfig {
    JitConfig {
        strategy: CompileStrategy::Inline,
        ..JitConfig::default()
    }
}

fn background_config(workers: usize) -> JitConfig {
    JitConfig {
        workers,
        strategy: CompileStrategy::Background,
        ..JitConfig::default()
    }
}

#[test]
fn invalid_entry_point_is_rejected() {
    let engine = JitEngine::with_config(CountingCompiler::new(), inline_config());
    let result = engine.prepare(&program(1), MAX_PROGRAM_CODE_LENGTH);
    assert_eq!(
        result.err(),
        Some(JitError::InvalidEntryPoint(MAX_PROGRAM_CODE_LENGTH))
    );
    // Nothing was compiled or cached for the rejected request.
    assert_eq!(engine.metrics().cache_misses, 0);
    assert_eq!(engine.cache_stats().entries, 0);
}

#[test]
fn inline_prepare_compiles_once_then_hits() -> anyhow::Result<()> {
    let engine = JitEngine::with_config(CountingCompiler::new(), inline_config());
    let source = program(7);

    let first = engine.prepare(&source, 0)?;
    let second = engine.prepare(&source, 16)?;

    assert!(Arc::ptr_eq(&first.wait()?, &second.wait()?));

    let metrics = engine.metrics();
    assert_eq!(metrics.shaders_compiled, 1);
    assert_eq!(metrics.cache_misses, 1);
    assert_eq!(metrics.cache_hits, 1);
    Ok(())
}

#[test]
fn entry_points_do_not_fragment_the_cache() {
    let engine = JitEngine::with_config(CountingCompiler::new(), inline_config());
    let source = program(7);
    let mut state = Vec::new();

    for entry_point in [0usize, 8, 64] {
        let prepared = engine.prepare(&source, entry_point).unwrap();
        engine.run(&prepared, &mut state).unwrap();
    }

    assert_eq!(state, vec![(7, 0), (7, 8), (7, 64)]);
    assert_eq!(engine.metrics().shaders_compiled, 1);
    assert_eq!(engine.cache_stats().entries, 1);
}

#[test]
fn inline_compile_failure_is_recoverable() {
    let engine = JitEngine::with_config(CountingCompiler::new(), inline_config());
    let bad = program(BAD_OPCODE);

    let result = engine.prepare(&bad, 0);
    assert!(matches!(result, Err(JitError::Compile(_))));
    assert_eq!(engine.cache_stats().entries, 0);

    // The failure is per-request; the engine keeps serving other programs.
    let prepared = engine.prepare(&program(3), 0).unwrap();
    let mut state = Vec::new();
    engine.run(&prepared, &mut state).unwrap();
    assert_eq!(state, vec![(3, 0)]);
}

#[test]
fn background_prepare_resolves_and_runs() -> anyhow::Result<()> {
    init_logging();
    let engine = JitEngine::with_config(CountingCompiler::new(), background_config(2));
    let prepared = engine.prepare(&program(9), 4)?;

    let mut state = Vec::new();
    engine.run(&prepared, &mut state)?;
    assert_eq!(state, vec![(9, 4)]);
    assert_eq!(engine.metrics().shaders_compiled, 1);
    Ok(())
}

#[test]
fn concurrent_prepares_compile_exactly_once() {
    const REQUESTERS: usize = 8;

    init_logging();
    let engine = Arc::new(JitEngine::with_config(
        CountingCompiler::with_delay(Duration::from_millis(30)),
        background_config(4),
    ));
    let source = program(5);

    let handles: Vec<_> = (0..REQUESTERS)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let source = source.clone();
            thread::spawn(move || engine.prepare(&source, 0).unwrap().wait().unwrap())
        })
        .collect();

    let shaders: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    // One work item, one compile, one unit shared by every requester.
    assert_eq!(engine.metrics().shaders_compiled, 1);
    for shader in &shaders[1..] {
        assert!(Arc::ptr_eq(shader, &shaders[0]));
    }
    assert_eq!(engine.cache_stats().entries, 1);
}

#[test]
fn try_run_skips_until_ready() {
    let engine = JitEngine::with_config(
        CountingCompiler::with_delay(Duration::from_millis(100)),
        background_config(1),
    );
    let prepared = engine.prepare(&program(2), 0).unwrap();
    let mut state = Vec::new();

    // The worker is still sleeping; the draw is skipped, not failed.
    assert_eq!(
        engine.try_run(&prepared, &mut state),
        RunOutcome::Skipped(SkipReason::NotReady)
    );
    assert!(state.is_empty());

    prepared.wait().unwrap();
    assert_eq!(engine.try_run(&prepared, &mut state), RunOutcome::Completed);
    assert_eq!(state, vec![(2, 0)]);
}

#[test]
fn failed_background_compile_skips_the_draw() {
    let engine = JitEngine::with_config(CountingCompiler::new(), background_config(1));
    let prepared = engine.prepare(&program(BAD_OPCODE), 0).unwrap();

    assert!(prepared.wait().is_err());

    let mut state = Vec::new();
    assert_eq!(
        engine.try_run(&prepared, &mut state),
        RunOutcome::Skipped(SkipReason::CompileFailed)
    );
    assert!(state.is_empty());
    assert!(matches!(
        engine.run(&prepared, &mut state),
        Err(JitError::Compile(_))
    ));

    // The failed reservation was retracted so a later prepare can retry.
    assert_eq!(engine.cache_stats().entries, 0);
    assert_eq!(engine.metrics().compile_failures, 1);
}

#[test]
fn try_wait_reports_not_ready_then_resolves() {
    let engine = JitEngine::with_config(
        CountingCompiler::with_delay(Duration::from_millis(100)),
        background_config(1),
    );
    let prepared = engine.prepare(&program(8), 0).unwrap();

    // The worker is still sleeping; the transient state is an error value
    // here, unlike try_run's skip.
    assert_eq!(prepared.try_wait().err(), Some(JitError::NotReady));

    prepared.wait().unwrap();
    assert_eq!(prepared.try_wait().unwrap().tag, 8);

    // A failed translation surfaces as a compile error, not NotReady.
    let failed = engine.prepare(&program(BAD_OPCODE), 0).unwrap();
    assert!(failed.wait().is_err());
    assert!(matches!(failed.try_wait(), Err(JitError::Compile(_))));
}

#[test]
fn shader_metadata_is_visible_after_compilation() {
    let engine = JitEngine::with_config(CountingCompiler::new(), inline_config());
    let source = program(4);
    let prepared = engine.prepare(&source, 0).unwrap();

    let meta = engine
        .shader_metadata(prepared.key())
        .expect("resident unit has metadata");
    assert_eq!(meta.access_count, 0);

    engine.prepare(&source, 0).unwrap(); // cache hit
    let meta = engine.shader_metadata(prepared.key()).unwrap();
    assert_eq!(meta.access_count, 1);

    // Keys never handed out by prepare report nothing.
    assert!(engine.shader_metadata(0).is_none());
}

#[test]
fn panicking_compiler_does_not_wedge_the_pool() {
    init_logging();
    let engine = JitEngine::with_config(CountingCompiler::new(), background_config(1));
    let prepared = engine.prepare(&program(PANIC_OPCODE), 0).unwrap();

    // The panic is folded into the failure path and the reservation
    // retracted, so waiters resolve instead of blocking forever.
    assert!(matches!(prepared.wait(), Err(CompileError::Panic(_))));
    assert_eq!(engine.cache_stats().entries, 0);
    assert_eq!(engine.metrics().compile_failures, 1);

    // The lone worker survived and keeps serving later programs.
    let prepared = engine.prepare(&program(11), 0).unwrap();
    let mut state = Vec::new();
    engine.run(&prepared, &mut state).unwrap();
    assert_eq!(state, vec![(11, 0)]);
}

#[test]
fn prepare_blocking_returns_a_ready_shader() {
    let engine = JitEngine::with_config(
        CountingCompiler::with_delay(Duration::from_millis(20)),
        background_config(1),
    );
    let prepared = engine.prepare_blocking(&program(6), 12).unwrap();
    assert!(prepared.is_ready());

    let mut state = Vec::new();
    assert_eq!(engine.try_run(&prepared, &mut state), RunOutcome::Completed);
    assert_eq!(state, vec![(6, 12)]);
}

#[test]
fn dropping_the_engine_drains_queued_work() {
    let engine = JitEngine::with_config(
        CountingCompiler::with_delay(Duration::from_millis(20)),
        background_config(1),
    );
    let prepared: Vec<_> = (0..4)
        .map(|tag| engine.prepare(&program(tag), 0).unwrap())
        .collect();

    drop(engine);

    // Teardown drains the queue before joining workers, so every handle
    // obtained beforehand still resolves.
    for (tag, shader) in prepared.iter().enumerate() {
        assert_eq!(shader.wait().unwrap().tag, tag as u32);
    }
}

#[test]
fn lru_eviction_forces_recompilation() {
    let config = JitConfig {
        max_cache_size: 2,
        strategy: CompileStrategy::Inline,
        ..JitConfig::default()
    };
    let engine = JitEngine::with_config(CountingCompiler::new(), config);

    engine.prepare(&program(1), 0).unwrap();
    engine.prepare(&program(2), 0).unwrap();
    engine.prepare(&program(3), 0).unwrap(); // evicts program 1
    assert_eq!(engine.cache_stats().entries, 2);
    assert_eq!(engine.metrics().shaders_evicted, 1);

    engine.prepare(&program(1), 0).unwrap(); // miss again
    assert_eq!(engine.metrics().shaders_compiled, 4);
}

#[test]
fn title_overrides_adjust_the_base_config() {
    let base = JitConfig::default();
    let mut overrides = TitleOverrides::new();
    overrides.insert(
        0x0004_0000_000c_ff00,
        TitleConfig {
            max_cache_size: Some(128),
            strategy: Some(CompileStrategy::Inline),
            ..TitleConfig::default()
        },
    );

    let tuned = overrides.resolve(0x0004_0000_000c_ff00, base);
    assert_eq!(tuned.max_cache_size, 128);
    assert_eq!(tuned.strategy, CompileStrategy::Inline);
    assert_eq!(tuned.workers, base.workers);

    // Unregistered titles keep the base config.
    let untouched = overrides.resolve(0xffff_ffff_ffff_ffff, base);
    assert_eq!(untouched.max_cache_size, base.max_cache_size);
    assert_eq!(untouched.strategy, base.strategy);
}
