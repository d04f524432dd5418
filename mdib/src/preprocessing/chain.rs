//! Ordered execution of preprocessing segments over one batch.
//!
//! Each segment makes one full pass over the batch before the next segment
//! starts. Entries a segment appends are seen by the segments after it, never
//! by the ones before. With the default order the structural validators run
//! first, so they never see the parent updates the version handler queues.

use tracing::{debug, trace};

use crate::core::error::{PreprocessingError, SegmentFailure};
use crate::core::modification::{DescriptionBatch, StateBatch};
use crate::preprocessing::cardinality::CardinalityChecker;
use crate::preprocessing::duplicate_handle::DuplicateHandleChecker;
use crate::preprocessing::handle_reference::HandleReferenceHandler;
use crate::preprocessing::type_consistency::TypeConsistencyChecker;
use crate::preprocessing::version_handler::VersionHandler;
use crate::preprocessing::{BoxedSegment, PreprocessingSegment};
use crate::storage::tree::MdibTree;

pub struct PreprocessingChain {
    segments: Vec<BoxedSegment>,
}

impl PreprocessingChain {
    pub fn new(segments: Vec<BoxedSegment>) -> Self {
        Self { segments }
    }

    /// Segment names in execution order.
    pub fn segment_names(&self) -> Vec<&'static str> {
        self.segments.iter().map(|segment| segment.name()).collect()
    }

    pub fn run_description(
        &mut self,
        batch: &mut DescriptionBatch,
        tree: &MdibTree,
    ) -> Result<(), PreprocessingError> {
        debug!(modifications = batch.len(), "preprocessing description batch");
        self.run(tree, |segment| segment.process_description(batch, tree))
    }

    pub fn run_states(
        &mut self,
        batch: &mut StateBatch,
        tree: &MdibTree,
    ) -> Result<(), PreprocessingError> {
        debug!(category = %batch.category, states = batch.len(), "preprocessing state batch");
        self.run(tree, |segment| segment.process_states(batch, tree))
    }

    fn run<F>(&mut self, tree: &MdibTree, mut step: F) -> Result<(), PreprocessingError>
    where
        F: FnMut(&mut (dyn PreprocessingSegment + Send + Sync)) -> Result<(), SegmentFailure>,
    {
        for segment in &mut self.segments {
            segment.before_first_modification(tree);
        }

        for segment in &mut self.segments {
            let name = segment.name();
            trace!(segment = name, "running segment");
            if let Err(failure) = step(segment.as_mut()) {
                let err = failure.into_preprocessing(name);
                debug!(error = %err, "batch rejected");
                return Err(err);
            }
        }

        for segment in &mut self.segments {
            segment.after_last_modification(tree);
        }
        Ok(())
    }
}

impl Default for PreprocessingChain {
    /// Structural validators first, then handle rewriting, then versioning.
    fn default() -> Self {
        Self::new(vec![
            Box::new(DuplicateHandleChecker),
            Box::new(TypeConsistencyChecker::default()),
            Box::new(CardinalityChecker::default()),
            Box::new(HandleReferenceHandler),
            Box::new(VersionHandler::default()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::core::error::SegmentError;
    use crate::core::kind::DescriptorKind;
    use crate::core::modification::Modification;
    use crate::test_support::{descriptor, initial_version, single_state};

    type Journal = Arc<Mutex<Vec<String>>>;

    /// Records hook calls and the handles it saw; optionally appends or fails.
    struct Recorder {
        name: &'static str,
        journal: Journal,
        append: Option<&'static str>,
        fail_on: Option<&'static str>,
    }

    impl Recorder {
        fn new(name: &'static str, journal: &Journal) -> Self {
            Self {
                name,
                journal: Arc::clone(journal),
                append: None,
                fail_on: None,
            }
        }

        fn log(&self, entry: String) {
            self.journal.lock().expect("journal").push(entry);
        }
    }

    impl PreprocessingSegment for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn before_first_modification(&mut self, _tree: &MdibTree) {
            self.log(format!("{}:before", self.name));
        }

        fn process_description(
            &mut self,
            batch: &mut DescriptionBatch,
            _tree: &MdibTree,
        ) -> Result<(), SegmentFailure> {
            let mut index = 0;
            while index < batch.len() {
                let handle = batch.get(index).expect("in range").handle().to_string();
                self.log(format!("{}:{}", self.name, handle));
                if self.fail_on == Some(handle.as_str()) {
                    return Err(SegmentFailure::at(
                        handle.clone(),
                        SegmentError::DuplicateHandle(handle),
                    ));
                }
                if let Some(extra) = self.append.take() {
                    let d = descriptor(extra, DescriptorKind::Vmd);
                    batch.push(Modification::update(d.clone(), vec![single_state(&d)]));
                }
                index += 1;
            }
            Ok(())
        }

        fn after_last_modification(&mut self, _tree: &MdibTree) {
            self.log(format!("{}:after", self.name));
        }
    }

    fn journal_entries(journal: &Journal) -> Vec<String> {
        journal.lock().expect("journal").clone()
    }

    fn one_insert() -> DescriptionBatch {
        let mds = descriptor("mds0", DescriptorKind::Mds);
        DescriptionBatch::new().insert(mds.clone(), vec![single_state(&mds)], None)
    }

    #[test]
    fn appended_entries_are_seen_by_later_segments_only() {
        let journal = Journal::default();
        let first = Recorder::new("first", &journal);
        let mut appender = Recorder::new("appender", &journal);
        appender.append = Some("extra");
        let last = Recorder::new("last", &journal);
        let mut chain = PreprocessingChain::new(vec![
            Box::new(first),
            Box::new(appender),
            Box::new(last),
        ]);

        let tree = MdibTree::new(initial_version());
        let mut batch = one_insert();
        chain.run_description(&mut batch, &tree).expect("chain");

        assert_eq!(batch.len(), 2);
        assert_eq!(
            journal_entries(&journal),
            vec![
                "first:before",
                "appender:before",
                "last:before",
                "first:mds0",
                "appender:mds0",
                "appender:extra",
                "last:mds0",
                "last:extra",
                "first:after",
                "appender:after",
                "last:after",
            ]
        );
    }

    #[test]
    fn failure_stops_chain_and_skips_after_hooks() {
        let journal = Journal::default();
        let mut failing = Recorder::new("failing", &journal);
        failing.fail_on = Some("mds0");
        let never = Recorder::new("never", &journal);
        let mut chain = PreprocessingChain::new(vec![Box::new(failing), Box::new(never)]);

        let tree = MdibTree::new(initial_version());
        let err = chain
            .run_description(&mut one_insert(), &tree)
            .expect_err("rejected");

        assert_eq!(err.segment, "failing");
        assert_eq!(err.handle.as_deref(), Some("mds0"));
        let entries = journal_entries(&journal);
        assert!(!entries.iter().any(|e| e == "never:mds0"));
        assert!(!entries.iter().any(|e| e.ends_with(":after")));
    }

    #[test]
    fn default_chain_runs_validators_before_versioning() {
        let chain = PreprocessingChain::default();
        assert_eq!(
            chain.segment_names(),
            vec![
                "duplicate_handle",
                "type_consistency",
                "cardinality",
                "handle_reference",
                "version_handler",
            ]
        );
    }
}
