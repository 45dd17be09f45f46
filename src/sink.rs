// Sink Protocol - where finalized entities go
//
// The driver hands every finalized entity to every sink, in registration
// order, before it starts the next entity. Sinks are free to buffer and
// batch; `flush` is their one chance to persist what is left and release
// files or connections.

use crate::entities::{Entity, Family, Person};
use crate::error::{IngestError, Result};

/// SinkProtocol - Output consumer for parsed entities
///
/// Adding an output format means implementing this trait; the parser does
/// not change.
pub trait Sink {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    fn accept_person(&mut self, person: &Person) -> Result<()>;

    fn accept_family(&mut self, family: &Family) -> Result<()>;

    /// Remove output from earlier runs (replace instead of append)
    fn on_discard_existing_output(&mut self) -> Result<()> {
        Ok(())
    }

    /// Persist buffered entities and release the output
    ///
    /// Called exactly once, after the last entity, on success and on error.
    fn flush(&mut self) -> Result<()>;
}

/// Offer one entity to every sink, in order
pub fn emit(sinks: &mut [&mut dyn Sink], entity: &Entity) -> Result<()> {
    for sink in sinks.iter_mut() {
        match entity {
            Entity::Family(family) => sink.accept_family(family)?,
            Entity::Person(person) => sink.accept_person(person)?,
        }
    }
    Ok(())
}

/// Flush every sink, even when an earlier one fails
///
/// Returns the first error.
pub fn flush_all(sinks: &mut [&mut dyn Sink]) -> Result<()> {
    let mut first_error: Option<IngestError> = None;

    for sink in sinks.iter_mut() {
        if let Err(e) = sink.flush() {
            tracing::error!(sink = sink.name(), error = %e, "Failed to flush sink");
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Call `on_discard_existing_output` on every sink, in order
///
/// Stops at the first failure; every sink is then flushed before the error
/// is returned.
pub fn discard_existing_output(sinks: &mut [&mut dyn Sink]) -> Result<()> {
    let mut failure: Option<IngestError> = None;

    for sink in sinks.iter_mut() {
        if let Err(e) = sink.on_discard_existing_output() {
            tracing::error!(sink = sink.name(), error = %e, "Failed to discard existing output");
            failure = Some(e);
            break;
        }
    }

    match failure {
        Some(e) => {
            // the discard error is the one reported
            let _ = flush_all(sinks);
            Err(e)
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EntityKind, RecordBuilder};
    use crate::sinks::MemorySink;

    struct FailingFlush;

    impl Sink for FailingFlush {
        fn name(&self) -> &str {
            "failing"
        }

        fn accept_person(&mut self, _person: &Person) -> Result<()> {
            Ok(())
        }

        fn accept_family(&mut self, _family: &Family) -> Result<()> {
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            Err(IngestError::SinkClosed("failing".to_string()))
        }
    }

    #[test]
    fn test_emit_dispatches_by_kind() {
        let mut a = MemorySink::new();
        let mut b = MemorySink::new();

        let family = Entity::from(RecordBuilder::new("F1", EntityKind::Family).finish());
        let person = Entity::from(RecordBuilder::new("I1", EntityKind::Person).finish());
        {
            let mut sinks: Vec<&mut dyn Sink> = vec![&mut a, &mut b];
            emit(&mut sinks, &family).unwrap();
            emit(&mut sinks, &person).unwrap();
        }

        for sink in [&a, &b] {
            assert_eq!(sink.families().len(), 1);
            assert_eq!(sink.people().len(), 1);
            assert_eq!(sink.families()[0].id(), "F1");
        }
    }

    struct FailingDiscard;

    impl Sink for FailingDiscard {
        fn name(&self) -> &str {
            "failing_discard"
        }

        fn accept_person(&mut self, _person: &Person) -> Result<()> {
            Ok(())
        }

        fn accept_family(&mut self, _family: &Family) -> Result<()> {
            Ok(())
        }

        fn on_discard_existing_output(&mut self) -> Result<()> {
            Err(IngestError::SinkClosed("failing_discard".to_string()))
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_discard_failure_flushes_every_sink() {
        let mut before = MemorySink::new();
        let mut failing = FailingDiscard;
        let mut after = MemorySink::new();
        let result = {
            let mut sinks: Vec<&mut dyn Sink> = vec![&mut before, &mut failing, &mut after];
            discard_existing_output(&mut sinks)
        };

        assert!(matches!(result, Err(IngestError::SinkClosed(_))));
        assert_eq!(before.flush_count(), 1);
        assert_eq!(after.flush_count(), 1);
    }

    #[test]
    fn test_discard_success_does_not_flush() {
        let mut memory = MemorySink::new();
        {
            let mut sinks: Vec<&mut dyn Sink> = vec![&mut memory];
            discard_existing_output(&mut sinks).unwrap();
        }
        assert_eq!(memory.flush_count(), 0);
    }

    #[test]
    fn test_flush_all_flushes_after_failure() {
        let mut failing = FailingFlush;
        let mut memory = MemorySink::new();
        let result = {
            let mut sinks: Vec<&mut dyn Sink> = vec![&mut failing, &mut memory];
            flush_all(&mut sinks)
        };

        assert!(matches!(result, Err(IngestError::SinkClosed(_))));
        assert_eq!(memory.flush_count(), 1);
    }
}
