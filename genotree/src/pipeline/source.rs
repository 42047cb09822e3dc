use crossbeam_channel::Sender;
use log::{debug, info, warn};

use crate::fasta::reader::SequenceReader;
use crate::fasta::{FastaError, SequenceRecord};
use crate::input::LineSource;
use crate::pipeline::shared::{PipelineCounters, SharedState};
use crate::pipeline::{GenotypeContext, PipelineError, PipelineParams, PipelineResult, SequenceShape};
use crate::progress::{ByteNum, ProgressNotifier};
use crate::vcf::encoder::{infer_layout, GenotypeShape};
use crate::vcf::genotype::{GenotypeCache, GenotypeLayout};
use crate::vcf::reader::{VcfHeader, VcfReader, VcfRecord};

/// Forwards the growth of a reader's byte count to the counters and the
/// progress notifier.
struct ByteTracker<'a> {
    last: ByteNum,
    counters: &'a PipelineCounters,
    progress_notifier: &'a dyn ProgressNotifier,
}

impl<'a> ByteTracker<'a> {
    #[must_use]
    fn new(counters: &'a PipelineCounters, progress_notifier: &'a dyn ProgressNotifier) -> Self {
        Self {
            last: ByteNum::ZERO,
            counters,
            progress_notifier,
        }
    }

    fn update(&mut self, total: ByteNum) {
        if total > self.last {
            let delta = total - self.last;
            self.counters.add_bytes(delta);
            self.progress_notifier.processed_bytes(delta);
            self.last = total;
        }
    }
}

/// Sends one record, returning `false` if every worker is gone.
#[must_use]
fn send_record<T>(sender: &Sender<T>, record: T, counters: &PipelineCounters) -> bool {
    if sender.send(record).is_err() {
        debug!("Record channel disconnected, stopping the source");
        return false;
    }

    counters.inc_records();
    true
}

/// Reads VCF records and sends them to the workers.
///
/// The genotype layout is published through the ready signal as soon as a
/// record tells it; records read before that are held back and sent right
/// after. The ready signal is closed on return in every case, so the
/// workers never wait for a layout that will not come.
pub(super) fn produce_genotypes<R: LineSource>(
    mut reader: VcfReader<R>,
    sender: Sender<VcfRecord>,
    shared: &SharedState<GenotypeContext>,
    params: &PipelineParams,
) -> PipelineResult<VcfHeader> {
    let result = send_genotypes(&mut reader, &sender, shared, params);

    shared.ready.close();
    shared.counters.set_skipped_lines(reader.skipped_lines());
    result
}

fn send_genotypes<R: LineSource>(
    reader: &mut VcfReader<R>,
    sender: &Sender<VcfRecord>,
    shared: &SharedState<GenotypeContext>,
    params: &PipelineParams,
) -> PipelineResult<VcfHeader> {
    let counters = &shared.counters;
    let mut bytes = ByteTracker::new(counters, params.progress_notifier.as_ref());

    let header = reader.read_header()?;
    bytes.update(reader.bytes_read());
    debug!("VCF header lists {} samples", header.sample_num());

    let publish = |layout: GenotypeLayout| {
        info!("Genotype layout: {}", layout);
        shared.ready.publish(GenotypeContext {
            shape: GenotypeShape::new(header.samples(), layout),
            cache: GenotypeCache::new(layout, params.heterozygosity_filter),
        });
    };

    let mut published = false;
    if let (Some(ploidy), Some(alleles)) = (params.ploidy, params.alleles) {
        publish(GenotypeLayout::new(ploidy, alleles));
        published = true;
    }

    let mut held_back = Vec::new();
    while let Some(record) = reader.read_record()? {
        bytes.update(reader.bytes_read());

        if !published {
            match infer_layout(&record, params.ploidy, params.alleles) {
                Ok(Some(layout)) => {
                    publish(layout);
                    published = true;

                    if !held_back.is_empty() {
                        debug!("Sending {} held back records", held_back.len());
                    }
                    for held in held_back.drain(..) {
                        if !send_record(sender, held, counters) {
                            return Ok(header);
                        }
                    }
                }
                Ok(None) => {
                    held_back.push(record);
                    continue;
                }
                Err(e) => {
                    warn!("Skipping line {}: {}", record.line_number(), e);
                    counters.inc_skipped_records();
                    continue;
                }
            }
        }

        if !send_record(sender, record, counters) {
            break;
        }
    }

    if !published {
        return Err(PipelineError::ShapeUnknown {
            held_back: held_back.len(),
        });
    }

    Ok(header)
}

/// Reads FASTA/FASTQ records and sends them to the workers.
///
/// Malformed records are skipped; only I/O errors stop the source.
pub(super) fn produce_sequences<R: LineSource>(
    mut reader: SequenceReader<R>,
    sender: Sender<SequenceRecord>,
    shared: &SharedState<SequenceShape>,
    params: &PipelineParams,
) -> PipelineResult<()> {
    shared.ready.publish(SequenceShape {
        kmer_size: params.kmer_size,
        normalize: params.normalize,
    });

    let counters = &shared.counters;
    let mut bytes = ByteTracker::new(counters, params.progress_notifier.as_ref());

    loop {
        let result = reader.read_sequence();
        bytes.update(reader.bytes_read());

        match result {
            Ok(Some(sequence)) => {
                if !send_record(&sender, sequence, counters) {
                    break;
                }
            }
            Ok(None) => break,
            Err(FastaError::IoError(e)) => {
                counters.set_skipped_lines(reader.skipped_lines());
                return Err(FastaError::IoError(e).into());
            }
            Err(e) => {
                warn!("Skipping sequence: {}", e);
                counters.inc_skipped_records();
            }
        }
    }

    counters.set_skipped_lines(reader.skipped_lines());
    Ok(())
}
