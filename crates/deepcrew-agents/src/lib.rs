//! Research crew: Web Searcher, Research Analyst and Technical Writer, plus
//! the query service that runs them once per query.

pub mod analyst;
pub mod crew;
pub mod searcher;
pub mod service;
pub mod writer;

pub use crew::{ResearchBackends, build_research_crew, create_research_crew};
pub use service::{ERROR_PREFIX, QueryHandler, QueryService, ResearchOutcome};
