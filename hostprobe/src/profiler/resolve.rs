//! Binding a connected session to a profiler.

use log::{debug, info, warn};

use super::{Profiler, ProfilerDescriptor, ProfilerRegistry};
use crate::error::{ProfilerError, Result};
use crate::session::Session;

/// Bind the first descriptor whose kind and predicate match `session`.
///
/// A predicate error counts as a non-match unless it is fatal.
pub async fn resolve(session: &mut Session, registry: &ProfilerRegistry) -> Result<Profiler> {
    if !session.is_connected() {
        return Err(ProfilerError::NoActiveSession.into());
    }
    if registry.is_empty() {
        return Err(ProfilerError::MissingConfiguration.into());
    }

    let kind = session.kind();
    for descriptor in registry.iter() {
        if descriptor.kind() != kind {
            continue;
        }
        debug!("resolve: {}: trying {}", session.host(), descriptor.name());
        match descriptor.matches(session).await {
            Ok(true) => {
                info!("resolve: {} is {}", session.host(), descriptor.name());
                return Ok(Profiler::bind(descriptor.as_ref()));
            }
            Ok(false) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!("resolve: {}: {} predicate failed: {}", session.host(), descriptor.name(), e),
        }
    }

    Err(ProfilerError::NoProfilerDetected {
        host: session.host().to_string(),
    }
    .into())
}

/// Bind `descriptor` without running its predicate.
pub fn force(session: &Session, descriptor: &dyn ProfilerDescriptor) -> Result<Profiler> {
    if !session.is_connected() {
        return Err(ProfilerError::NoActiveSession.into());
    }
    if descriptor.kind() != session.kind() {
        return Err(ProfilerError::KindMismatch {
            profiler: descriptor.name().to_string(),
            expected: descriptor.kind(),
            actual: session.kind(),
        }
        .into());
    }
    info!("resolve: {} forced to {}", session.host(), descriptor.name());
    Ok(Profiler::bind(descriptor))
}
