use std::fs;

use orbpost::{
    constants::{COMPLETION_MARKER_FILE, RUN_CONTEXT_FILE},
    orchestrator::{
        is_complete, run_nested_sampling, LivePoints, NestedSampler, NestedSamplingConfig,
        OrchestratorOutcome, SamplerRequest, SamplerSummary,
    },
    postfit_errors::PostfitError,
    run_context::RunContext,
};

mod common;
use common::{planet_context, tmp_root};

/// Records every request and writes a fake checkpoint file into the log directory.
#[derive(Default)]
struct CountingSampler {
    calls: usize,
    last_labels: Vec<String>,
    last_live: usize,
    last_resume: Option<bool>,
    fail_with: Option<PostfitError>,
}

impl NestedSampler for CountingSampler {
    fn run(&mut self, request: &SamplerRequest<'_>) -> Result<SamplerSummary, PostfitError> {
        self.calls += 1;
        self.last_labels = request.labels.clone();
        self.last_live = request.min_live_points;
        self.last_resume = Some(request.resume);
        fs::write(request.log_dir.join("results.json"), "{}")?;
        if let Some(err) = self.fail_with.take() {
            return Err(err);
        }
        Ok(SamplerSummary {
            log_evidence: -123.4,
            log_evidence_err: 0.2,
            n_samples: 5000,
        })
    }
}

fn config() -> NestedSamplingConfig {
    NestedSamplingConfig::builder()
        .live_points(LivePoints::PerDimension(50))
        .dlogz(0.1)
        .min_ess(200)
        .build()
        .unwrap()
}

#[test]
fn test_completed_run_is_never_repeated() {
    let (_guard, root) = tmp_root();
    let out = root.join("ultranest");
    let ctx = planet_context();
    let mut sampler = CountingSampler::default();

    let first = run_nested_sampling(&mut sampler, &ctx, &config(), &out).unwrap();
    assert!(matches!(first, OrchestratorOutcome::Completed(ref s) if s.n_samples == 5000));
    assert_eq!(sampler.calls, 1);
    assert_eq!(sampler.last_resume, Some(false));
    assert_eq!(sampler.last_live, 200);
    assert_eq!(
        sampler.last_labels,
        vec!["b-P", "b-K", "b-f", "harps-offset"]
    );

    assert!(is_complete(&out));
    assert_eq!(fs::metadata(out.join(COMPLETION_MARKER_FILE)).unwrap().len(), 0);
    let saved = RunContext::load(&out.join(RUN_CONTEXT_FILE)).unwrap();
    assert_eq!(saved.sampler_config(), Some(&config()));
    assert_eq!(saved.parameters(), ctx.parameters());

    let second = run_nested_sampling(&mut sampler, &ctx, &config(), &out).unwrap();
    assert_eq!(second, OrchestratorOutcome::AlreadyComplete);
    assert_eq!(sampler.calls, 1);
}

#[test]
fn test_failure_leaves_no_marker_and_resumes() {
    let (_guard, root) = tmp_root();
    let out = root.join("ultranest");
    let ctx = planet_context();
    let mut sampler = CountingSampler {
        fail_with: Some(PostfitError::InvalidParameter("likelihood returned NaN".into())),
        ..Default::default()
    };

    let err = run_nested_sampling(&mut sampler, &ctx, &config(), &out).unwrap_err();
    assert_eq!(
        err,
        PostfitError::ExternalSampler("Invalid parameter: likelihood returned NaN".into())
    );
    assert!(!is_complete(&out));
    assert!(!out.join(RUN_CONTEXT_FILE).exists());

    // partial state left behind by the failed attempt is handed back to the sampler
    let outcome = run_nested_sampling(&mut sampler, &ctx, &config(), &out).unwrap();
    assert!(matches!(outcome, OrchestratorOutcome::Completed(_)));
    assert_eq!(sampler.calls, 2);
    assert_eq!(sampler.last_resume, Some(true));
    assert!(is_complete(&out));
}

#[test]
fn test_external_errors_pass_through() {
    let (_guard, root) = tmp_root();
    let mut sampler = CountingSampler {
        fail_with: Some(PostfitError::ExternalSampler("engine not installed".into())),
        ..Default::default()
    };
    let err = run_nested_sampling(&mut sampler, &planet_context(), &config(), &root).unwrap_err();
    assert_eq!(err, PostfitError::ExternalSampler("engine not installed".into()));
}
