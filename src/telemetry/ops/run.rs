use tracing::Span;
use tracing::info_span;

use crate::telemetry::ctx::{OpMarker, PhaseSpan};

#[derive(Copy, Clone, Debug)]
pub struct Run;

#[derive(Copy, Clone, Debug)]
pub enum Phase { Feed, Fetch, Normalize, Filter, Summarize, Write }

impl PhaseSpan for Phase {
    fn name(&self) -> &'static str { match self {
        Phase::Feed => "feed",
        Phase::Fetch => "fetch",
        Phase::Normalize => "normalize",
        Phase::Filter => "filter",
        Phase::Summarize => "summarize",
        Phase::Write => "write",
    }}
    fn span(&self) -> Span { match self {
        Phase::Feed => info_span!("feed"),
        Phase::Fetch => info_span!("fetch"),
        Phase::Normalize => info_span!("normalize"),
        Phase::Filter => info_span!("filter"),
        Phase::Summarize => info_span!("summarize"),
        Phase::Write => info_span!("write"),
    }}
}

impl OpMarker for Run {
    const NAME: &'static str = "run";
    type Phase = Phase;
    fn root_span() -> Span { info_span!("run") }
}
