use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::control::{CancelToken, JobCancelled};
use crate::engine::{Engine, EngineDescriptor, EngineProfile, JobOptions, QualityLevel, WorkUnit};
use crate::executor::ExecHooks;
use crate::planner::{ChunkSpan, WorkerBounds};
use crate::retry::{EngineError, RetryPolicy};

type Behavior = Box<dyn Fn(&WorkUnit, usize) -> Result<String, EngineError> + Send + Sync>;

struct Scripted {
    desc: EngineDescriptor,
    available: bool,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(
        desc: EngineDescriptor,
        behavior: impl Fn(&WorkUnit, usize) -> Result<String, EngineError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            desc,
            available: true,
            behavior: Box::new(behavior),
            calls: AtomicUsize::new(0),
        })
    }

    fn offline(desc: EngineDescriptor) -> Arc<Self> {
        Arc::new(Self {
            desc,
            available: false,
            behavior: Box::new(|_, _| Ok("never".into())),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Engine for Scripted {
    fn descriptor(&self) -> &EngineDescriptor {
        &self.desc
    }
    fn available(&self) -> bool {
        self.available
    }
    fn process(
        &self,
        unit: &WorkUnit,
        _options: &JobOptions,
        progress: &dyn Fn(f64),
    ) -> Result<String, EngineError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        progress(50.0);
        (self.behavior)(unit, n)
    }
}

fn chain(engines: &[Arc<Scripted>]) -> Vec<Arc<dyn Engine>> {
    engines.iter().map(|e| Arc::clone(e) as Arc<dyn Engine>).collect()
}

fn span(index: usize) -> WorkUnit {
    WorkUnit::chunk(
        "talk.mp3",
        ChunkSpan {
            index,
            start_secs: index as f64 * 300.0,
            end_secs: (index + 1) as f64 * 300.0,
        },
    )
}

fn run_chunk(engines: &[Arc<Scripted>]) -> crate::executor::ChunkResult {
    process_chunk_with_fallback(
        &chain(engines),
        &span(0),
        0,
        &JobOptions::new(),
        &RetryPolicy::immediate(),
        &|_| {},
    )
}

fn ok_engine(name: &str, rank: u8) -> Arc<Scripted> {
    let text = format!("from {}", name);
    Scripted::new(EngineDescriptor::new(name, rank), move |_, _| Ok(text.clone()))
}

#[test]
fn enomem_advances_immediately_with_reason() {
    let local = Scripted::new(EngineDescriptor::new("whisper-cpp", 0), |_, _| {
        Err(EngineError::Opaque("ggml: ENOMEM".into()))
    });
    let cloud = ok_engine("whisper-api", 1);
    let r = run_chunk(&[local.clone(), cloud.clone()]);

    assert!(r.success);
    assert_eq!(local.calls(), 1);
    assert_eq!(r.retry_count, 0);
    assert_eq!(r.engine_used.as_deref(), Some("whisper-api"));
    assert_eq!(r.quality_level, QualityLevel::Medium);
    assert!(r.fallback_reason.as_deref().unwrap().contains("memory"));
}

#[test]
fn network_error_attempted_max_retries_plus_one() {
    let flaky = Scripted::new(EngineDescriptor::new("whisper-api", 0), |_, _| {
        Err(EngineError::Opaque("connection refused".into()))
    });
    let backup = ok_engine("backup", 1);
    let r = run_chunk(&[flaky.clone(), backup]);

    assert!(r.success);
    assert_eq!(flaky.calls(), RetryPolicy::immediate().max_retries as usize + 1);
    assert_eq!(r.engine_used.as_deref(), Some("backup"));
}

#[test]
fn general_error_retried_once() {
    let broken = Scripted::new(EngineDescriptor::new("a", 0), |_, _| {
        Err(EngineError::General("bad frame".into()))
    });
    let r = run_chunk(&[broken.clone(), ok_engine("b", 1)]);
    assert!(r.success);
    assert_eq!(broken.calls(), 2);
}

#[test]
fn first_try_success_has_no_reason_but_retry_does() {
    let r = run_chunk(&[ok_engine("a", 0)]);
    assert!(r.fallback_reason.is_none());
    assert_eq!(r.quality_level, QualityLevel::High);

    let once = Scripted::new(EngineDescriptor::new("a", 0), |_, n| {
        if n == 0 {
            Err(EngineError::TransientNetwork("reset".into()))
        } else {
            Ok("text".into())
        }
    });
    let r = run_chunk(&[once]);
    assert_eq!(r.retry_count, 1);
    assert!(r.fallback_reason.is_some());
}

#[test]
fn unavailable_and_whole_only_engines_are_skipped_for_chunks() {
    let offline = Scripted::offline(EngineDescriptor::new("whisper-cpp", 0));
    let whole_only = Scripted::new(
        EngineDescriptor::new("youtube-transcript-api", 1).whole_only(),
        |_, _| Ok("captions".into()),
    );
    let low = ok_engine("local-small", 2);
    let r = run_chunk(&[offline.clone(), whole_only.clone(), low]);

    assert_eq!(offline.calls(), 0);
    assert_eq!(whole_only.calls(), 0);
    assert_eq!(r.engine_used.as_deref(), Some("local-small"));
    assert_eq!(r.quality_level, QualityLevel::Low);
    assert_eq!(r.fallback_reason.as_deref(), Some("whisper-cpp unavailable"));
}

#[test]
fn all_engines_failing_keeps_last_error() {
    let a = Scripted::new(EngineDescriptor::new("a", 0), |_, _| {
        Err(EngineError::ResourceExhaustion("oom".into()))
    });
    let b = Scripted::new(EngineDescriptor::new("b", 1), |_, _| {
        Err(EngineError::Opaque("invalid audio header".into()))
    });
    let r = run_chunk(&[a, b]);
    assert!(!r.success);
    assert_eq!(r.quality_level, QualityLevel::Failed);
    assert_eq!(r.error.as_deref(), Some("invalid audio header"));
    assert_eq!(r.fallback_reason.as_deref(), Some(ALL_ENGINES_FAILED));
    assert_eq!(r.retry_count, 1);
}

fn settings() -> FallbackSettings {
    FallbackSettings {
        retry: RetryPolicy::immediate(),
        bounds: WorkerBounds::new(1, 4),
        available_memory: Some(u64::MAX / 2),
        ..FallbackSettings::default()
    }
}

#[test]
fn short_job_uses_whole_path_and_whole_only_engines() {
    let a = Scripted::new(EngineDescriptor::new("a", 0), |_, _| {
        Err(EngineError::Unavailable("no api key".into()))
    });
    let yt = Scripted::new(
        EngineDescriptor::new("youtube-transcript-api", 2).whole_only(),
        |u, _| {
            assert!(u.span.is_none());
            Ok("captions".into())
        },
    );
    let engine = FallbackEngine::new(
        chain(&[a.clone(), yt]),
        EngineProfile::builtin("a"),
        settings(),
    );
    let t = engine
        .transcribe("https://example.com/v", 120.0, &JobOptions::new(), ExecHooks::default())
        .unwrap();
    assert_eq!(t.text, "captions");
    assert_eq!(t.engine_used.as_deref(), Some("youtube-transcript-api"));
    assert_eq!(a.calls(), 1);
    assert_eq!(t.report.total_chunks, 1);
    assert_eq!(t.report.quality_counts.low, 1);
    assert!(t.is_complete());
}

#[test]
fn long_job_is_chunked_and_annotated() {
    let local = Scripted::new(EngineDescriptor::new("whisper-cpp", 0), |u, _| {
        let span = u.span.expect("chunked");
        if span.index == 2 {
            Err(EngineError::Opaque("cannot allocate memory".into()))
        } else {
            Ok(format!("local{}", span.index))
        }
    });
    let cloud = Scripted::new(EngineDescriptor::new("whisper-api", 1), |u, _| {
        Ok(format!("cloud{}", u.span.map(|s| s.index).unwrap_or(99)))
    });
    let engine = FallbackEngine::new(
        chain(&[local, cloud]),
        EngineProfile::builtin("whisper-cpp"),
        settings(),
    );
    let t = engine
        .transcribe("talk.mp3", 1000.0, &JobOptions::new(), ExecHooks::default())
        .unwrap();

    assert_eq!(t.report.total_chunks, 4);
    assert_eq!(t.report.engine_usage.get("whisper-cpp"), Some(&3));
    assert_eq!(t.report.engine_usage.get("whisper-api"), Some(&1));
    assert_eq!(t.report.fallbacks.len(), 1);
    assert_eq!(t.report.fallbacks[0].0, 2);
    assert!((t.report.score - (3.0 * 100.0 + 70.0) / 4.0).abs() < 1e-9);
    assert_eq!(t.engine_used.as_deref(), Some("whisper-cpp"));
    assert_eq!(
        t.text,
        "local0\nlocal1\n[chunk 3: whisper-api (medium)]\ncloud2\n[chunk 4: whisper-cpp (high)]\nlocal3"
    );
}

#[test]
fn failed_chunks_are_reported_without_failing_the_call() {
    let flaky = Scripted::new(EngineDescriptor::new("a", 0), |u, _| match u.span {
        Some(s) if s.index == 1 => Err(EngineError::Capability("unsupported codec".into())),
        _ => Ok("ok".into()),
    });
    let engine = FallbackEngine::new(chain(&[flaky]), EngineProfile::builtin("a"), settings());
    let t = engine
        .transcribe("a.wav", 900.0, &JobOptions::new(), ExecHooks::default())
        .unwrap();
    assert_eq!(t.failed_chunks, vec![1]);
    assert_eq!(t.error.as_deref(), Some("unsupported request: unsupported codec"));
    assert!(!t.is_complete());
}

#[test]
fn target_workers_drives_chunk_size() {
    let engine = FallbackEngine::new(
        chain(&[ok_engine("whisper-cpp", 0)]),
        EngineProfile::builtin("whisper-cpp"),
        FallbackSettings {
            target_workers: Some(4),
            ..settings()
        },
    );
    assert_eq!(engine.chunk_secs_for(3600.0), 600);
}

#[test]
fn untargeted_chunk_size_follows_the_profile() {
    let s = settings();
    let local = EngineProfile::builtin("whisper-cpp");
    assert_eq!(s.chunk_secs_for(3600.0, &local), 300);
    assert_eq!(s.chunk_secs_for(3600.0, &local.with_chunk_secs(120)), 120);
    assert_eq!(s.chunk_secs_for(3600.0, &EngineProfile::builtin("x")), 600);
    // profiles that never chunk fall back to the configured default
    let captions = EngineProfile::builtin("youtube-transcript-api");
    assert_eq!(s.chunk_secs_for(3600.0, &captions), s.default_chunk_secs);
}

#[test]
fn long_job_without_chunking_engines_runs_whole() {
    let offline = Scripted::offline(EngineDescriptor::new("whisper-cpp", 0));
    let yt = Scripted::new(
        EngineDescriptor::new("youtube-transcript-api", 1).whole_only(),
        |u, _| {
            assert!(u.span.is_none());
            Ok("full captions".into())
        },
    );
    let engine = FallbackEngine::new(
        chain(&[offline.clone(), yt.clone()]),
        EngineProfile::builtin("whisper-cpp"),
        settings(),
    );
    let t = engine
        .transcribe("https://example.com/v", 3600.0, &JobOptions::new(), ExecHooks::default())
        .unwrap();

    assert!(t.is_complete());
    assert_eq!(yt.calls(), 1);
    assert_eq!(offline.calls(), 0);
    assert_eq!(t.text, "full captions");
    assert_eq!(t.report.total_chunks, 1);
    assert_eq!(t.engine_used.as_deref(), Some("youtube-transcript-api"));
}

#[test]
fn cancel_during_whole_run_discards_the_result() {
    let cancel = CancelToken::new();
    let trip = cancel.clone();
    let slow = Scripted::new(EngineDescriptor::new("a", 0), move |_, _| {
        trip.cancel();
        Ok("finished anyway".into())
    });
    let engine = FallbackEngine::new(chain(&[slow.clone()]), EngineProfile::builtin("a"), settings());
    let err = engine
        .transcribe(
            "a.wav",
            60.0,
            &JobOptions::new(),
            ExecHooks {
                on_progress: None,
                cancel: Some(&cancel),
            },
        )
        .unwrap_err();
    assert!(err.downcast_ref::<JobCancelled>().is_some());
    assert_eq!(slow.calls(), 1);
}

#[test]
fn low_rank_engine_first_in_chain_is_reported_low() {
    let small = ok_engine("local-small", 2);
    let big = ok_engine("whisper-cpp", 0);
    let engine = FallbackEngine::new(
        chain(&[small.clone(), big.clone()]),
        EngineProfile::builtin("whisper-cpp"),
        settings(),
    );
    let t = engine
        .transcribe("talk.mp3", 900.0, &JobOptions::new(), ExecHooks::default())
        .unwrap();

    assert_eq!(big.calls(), 0);
    assert_eq!(t.report.total_chunks, 3);
    assert_eq!(t.report.quality_counts.low, 3);
    assert_eq!(t.report.quality_counts.high, 0);
    assert!((t.report.score - 40.0).abs() < 1e-9);
    assert!(t.report.fallbacks.is_empty());

    let r = run_chunk(&[small]);
    assert_eq!(r.quality_level, QualityLevel::Low);
    assert!(r.fallback_reason.is_none());
}

#[test]
fn cancelled_before_start() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let engine = FallbackEngine::new(chain(&[ok_engine("a", 0)]), EngineProfile::builtin("a"), settings());
    let err = engine
        .transcribe(
            "a.wav",
            2000.0,
            &JobOptions::new(),
            ExecHooks {
                on_progress: None,
                cancel: Some(&cancel),
            },
        )
        .unwrap_err();
    assert!(err.downcast_ref::<JobCancelled>().is_some());
}
