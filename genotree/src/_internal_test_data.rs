use std::fmt::Write as _;
use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use lazy_static::lazy_static;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::distance::DistanceMatrix;

pub const SIMPLE_VCF: &str = "##fileformat=VCFv4.2
##source=genotree
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\tS3
1\t100\trs1\tA\tG\t50\tPASS\t.\tGT\t0/0\t0/1\t1/1
1\t200\trs2\tC\tT\t50\tPASS\t.\tGT\t0/1\t0/1\t./.
";

pub const SIMPLE_FASTA: &str = ">alpha
ACGTACGT
AAGG
CCTT

>beta second sequence
GGGGCCCCAATT
>gamma
acgtnnacgtacgg
";

pub const SIMPLE_FASTQ: &str = "@read_1 lane 3
GATTACAGATTACA
+
@@@IIIII@@@@II
@read_2
ACGT
+read_2
IIII
";

pub const FOUR_LEAF_ROWS: [[f64; 4]; 4] = [
    [0.0, 1.0, 4.0, 9.0],
    [1.0, 0.0, 5.0, 10.0],
    [4.0, 5.0, 0.0, 2.0],
    [9.0, 10.0, 2.0, 0.0],
];

lazy_static! {
    pub static ref SIMPLE_VCF_GZ: Vec<u8> = gzip(SIMPLE_VCF.as_bytes());
    pub static ref FOUR_LEAF_MATRIX: DistanceMatrix = DistanceMatrix::from_rows(
        ["A", "B", "C", "D"].map(str::to_owned),
        &FOUR_LEAF_ROWS.map(|row| row.to_vec()),
    );
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Random diploid biallelic VCF with roughly 10% missing calls.
#[must_use]
pub fn synthetic_vcf(sample_num: usize, record_num: usize) -> String {
    const GENOTYPES: [&str; 5] = ["0/0", "0/1", "1/1", "0|1", "./."];

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(404);
    let mut vcf = String::from(
        "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT",
    );
    for sample in 0..sample_num {
        write!(vcf, "\tSAMPLE_{}", sample).unwrap();
    }
    vcf.push('\n');

    for record in 0..record_num {
        write!(vcf, "1\t{}\t.\tA\tT\t.\tPASS\t.\tGT", (record + 1) * 10).unwrap();
        for _ in 0..sample_num {
            let genotype = if rng.gen_bool(0.1) {
                GENOTYPES[4]
            } else {
                GENOTYPES[rng.gen_range(0..4)]
            };
            write!(vcf, "\t{}", genotype).unwrap();
        }
        vcf.push('\n');
    }

    vcf
}

/// Random nucleotide sequences with occasional `N` bases, in FASTA format.
#[must_use]
pub fn synthetic_fasta(sequence_num: usize, sequence_len: usize) -> String {
    const BASES: &[u8; 5] = b"ACGTN";
    const LINE_LEN: usize = 60;

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1337);
    let mut fasta = String::new();
    for sequence in 0..sequence_num {
        writeln!(fasta, ">seq_{}", sequence).unwrap();
        let bases: Vec<u8> = (0..sequence_len)
            .map(|_| {
                if rng.gen_bool(0.01) {
                    BASES[4]
                } else {
                    BASES[rng.gen_range(0..4)]
                }
            })
            .collect();
        for line in bases.chunks(LINE_LEN) {
            fasta.push_str(&String::from_utf8_lossy(line));
            fasta.push('\n');
        }
    }

    fasta
}

/// Random symmetric matrix with a zero diagonal.
#[must_use]
pub fn random_distance_matrix(size: usize) -> DistanceMatrix {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
    let labels: Vec<String> = (0..size).map(|i| format!("L{}", i)).collect();
    let mut matrix = DistanceMatrix::new(labels);

    for i in 0..size {
        for j in 0..i {
            matrix.set_symmetric(i, j, rng.gen_range(0.0..1.0));
        }
    }

    matrix
}
