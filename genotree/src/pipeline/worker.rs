use std::sync::Arc;

use crossbeam_channel::Receiver;
use log::{trace, warn};

use crate::fasta::SequenceRecord;
use crate::kmer::KmerProfile;
use crate::pipeline::accumulator::PairwiseAccumulator;
use crate::pipeline::shared::SharedState;
use crate::pipeline::{GenotypeContext, SequenceShape};
use crate::vcf::encoder::encode_record;
use crate::vcf::reader::VcfRecord;

/// A sequence turned into its k-mer profile, tagged with its input position.
#[derive(Debug, Clone)]
pub(super) struct ProfiledSequence {
    pub ordinal: usize,
    pub name: String,
    pub profile: KmerProfile,
}

/// Encodes records until the channel is closed and drained.
///
/// Returns `None` if the source closed the ready signal without a layout.
pub(super) fn accumulate_genotypes(
    receiver: Receiver<VcfRecord>,
    shared: Arc<SharedState<GenotypeContext>>,
    ignore_missing: bool,
) -> Option<PairwiseAccumulator> {
    let context = shared.ready.wait()?;
    let sample_num = context.shape.sample_num();
    let mut accumulator = PairwiseAccumulator::new(sample_num, ignore_missing);

    for record in receiver.iter() {
        match encode_record(&record, sample_num, &context.cache) {
            Ok(site) => accumulator.add_site(&site),
            Err(e) => {
                warn!("Skipping line {}: {}", record.line_number(), e);
                shared.counters.inc_skipped_records();
            }
        }
    }

    trace!("Worker accumulated {} sites", accumulator.site_num());
    Some(accumulator)
}

pub(super) fn profile_sequences(
    receiver: Receiver<SequenceRecord>,
    shared: Arc<SharedState<SequenceShape>>,
) -> Vec<ProfiledSequence> {
    let shape = match shared.ready.wait() {
        Some(shape) => shape,
        None => return Vec::new(),
    };

    let profiles: Vec<ProfiledSequence> = receiver
        .iter()
        .map(|sequence| ProfiledSequence {
            ordinal: sequence.ordinal(),
            name: sequence.name().to_owned(),
            profile: KmerProfile::from_sequence(
                sequence.bases(),
                shape.kmer_size,
                shape.normalize,
            ),
        })
        .collect();

    trace!("Worker profiled {} sequences", profiles.len());
    profiles
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::fasta::SequenceRecord;
    use crate::kmer::KmerSize;
    use crate::pipeline::shared::SharedState;
    use crate::pipeline::worker::{accumulate_genotypes, profile_sequences};
    use crate::pipeline::{GenotypeContext, SequenceShape};
    use crate::vcf::encoder::GenotypeShape;
    use crate::vcf::genotype::{GenotypeCache, GenotypeLayout, HeterozygosityFilter};
    use crate::vcf::reader::VcfRecord;

    fn genotype_state() -> Arc<SharedState<GenotypeContext>> {
        let layout = GenotypeLayout::new(2, 2);
        let shared = Arc::new(SharedState::new());
        shared.ready.publish(GenotypeContext {
            shape: GenotypeShape::new(vec!["A".to_owned(), "B".to_owned()], layout),
            cache: GenotypeCache::new(layout, HeterozygosityFilter::All),
        });
        shared
    }

    #[test_log::test]
    fn test_malformed_records_are_skipped() {
        let shared = genotype_state();
        let (sender, receiver) = crossbeam_channel::unbounded();
        sender
            .send(VcfRecord::new(2, "1\t1\t.\tA\tC\t.\t.\t.\tGT\t0/1\t1/1"))
            .unwrap();
        sender.send(VcfRecord::new(3, "1\t2\t.\tA")).unwrap();
        sender
            .send(VcfRecord::new(4, "1\t3\t.\tA\tC\t.\t.\t.\tDP\t5\t7"))
            .unwrap();
        drop(sender);

        let accumulator = accumulate_genotypes(receiver, shared.clone(), false).unwrap();

        assert_eq!(accumulator.site_num(), 1);
        assert_eq!(accumulator.dot(0, 1), 1);
        assert_eq!(shared.counters.snapshot().skipped_records, 2);
    }

    #[test]
    fn test_closed_ready_signal() {
        let shared: Arc<SharedState<GenotypeContext>> = Arc::new(SharedState::new());
        shared.ready.close();
        let (_sender, receiver) = crossbeam_channel::unbounded();

        assert!(accumulate_genotypes(receiver, shared, false).is_none());
    }

    #[test]
    fn test_profile_sequences() {
        let shared = Arc::new(SharedState::new());
        shared.ready.publish(SequenceShape {
            kmer_size: KmerSize::new(2),
            normalize: false,
        });
        let (sender, receiver) = crossbeam_channel::unbounded();
        sender
            .send(SequenceRecord::new(0, "first read", b"ACGT".to_vec(), None))
            .unwrap();
        sender
            .send(SequenceRecord::new(1, "second", b"AAAA".to_vec(), None))
            .unwrap();
        drop(sender);

        let profiles = profile_sequences(receiver, shared);

        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].ordinal, 0);
        assert_eq!(profiles[0].name, "first");
        assert_eq!(profiles[1].profile.total(), 6);
    }
}
