//! End-to-end tests for the chunked stream parser

use varchunk::{Chunk, ChunkArray, ChunkStream, Dtype, ParserConfig, Result};

/// The configuration used by the main scenarios: two samples, diploid,
/// two-record chunks, and a representative field mix.
fn scenario_config() -> ParserConfig {
    let mut config = ParserConfig::default();
    config.chunk_length = 2;
    config.n_samples = 2;
    config.ploidy = 2;
    config.fields = vec![
        "variants/CHROM".into(),
        "variants/POS".into(),
        "variants/ALT".into(),
        "variants/QUAL".into(),
        "variants/FILTER_PASS".into(),
        "variants/FILTER_q10".into(),
        "variants/DP".into(),
        "calldata/GT".into(),
    ];
    config.types.insert("variants/DP".into(), Dtype::Int32);
    config.types.insert("calldata/GT".into(), Dtype::Int8);
    config.numbers.insert("variants/ALT".into(), 3);
    config
}

fn parse(data: &'static [u8], config: &ParserConfig) -> Vec<Chunk> {
    ChunkStream::from_reader(data, config)
        .unwrap()
        .collect::<Result<_>>()
        .unwrap()
}

/// Fixed-width bytes at an index prefix, with trailing NULs trimmed.
fn fixed_str(array: &ChunkArray, index: &[usize]) -> String {
    let a = array.as_bytes().unwrap();
    let mut view = a.view();
    for &i in index {
        view = view.index_axis_move(ndarray::Axis(0), i);
    }
    view.iter()
        .copied()
        .take_while(|&b| b != 0)
        .map(char::from)
        .collect()
}

#[test]
fn test_two_records_one_chunk() {
    let data = b"20\t14370\trs6\tG\tA\t29\tPASS\tDP=14\tGT\t0|0\t1|0\n\
                 20\t17330\t.\tT\tA\t3\tq10\tDP=11\tGT\t0|0\t0|1\n";
    let chunks = parse(data, &scenario_config());
    assert_eq!(chunks.len(), 1);
    let chunk = &chunks[0];
    assert_eq!(chunk.len(), 2);

    let chrom = chunk.get("variants/CHROM").unwrap();
    assert_eq!(fixed_str(chrom, &[0]), "20");
    assert_eq!(fixed_str(chrom, &[1]), "20");

    let pos = chunk.get("variants/POS").unwrap().as_i32().unwrap();
    assert_eq!(pos.shape(), &[2]);
    assert_eq!(pos[[0]], 14370);
    assert_eq!(pos[[1]], 17330);

    let alt = chunk.get("variants/ALT").unwrap();
    assert_eq!(alt.shape(), &[2, 3, 1]);
    assert_eq!(fixed_str(alt, &[0, 0]), "A");
    assert_eq!(fixed_str(alt, &[1, 0]), "A");
    assert_eq!(fixed_str(alt, &[0, 1]), "");

    let qual = chunk.get("variants/QUAL").unwrap().as_f32().unwrap();
    assert_eq!(qual[[0]], 29.0);
    assert_eq!(qual[[1]], 3.0);

    let pass = chunk.get("variants/FILTER_PASS").unwrap().as_bool().unwrap();
    assert_eq!(pass[[0]], true);
    assert_eq!(pass[[1]], false);
    let q10 = chunk.get("variants/FILTER_q10").unwrap().as_bool().unwrap();
    assert_eq!(q10[[0]], false);
    assert_eq!(q10[[1]], true);

    let dp = chunk.get("variants/DP").unwrap().as_i32().unwrap();
    assert_eq!(dp.shape(), &[2]);
    assert_eq!(dp[[0]], 14);
    assert_eq!(dp[[1]], 11);

    let gt = chunk.get("calldata/GT").unwrap().as_i8().unwrap();
    assert_eq!(gt.shape(), &[2, 2, 2]);
    assert_eq!(gt[[0, 0, 0]], 0);
    assert_eq!(gt[[0, 0, 1]], 0);
    assert_eq!(gt[[0, 1, 0]], 1);
    assert_eq!(gt[[0, 1, 1]], 0);
    assert_eq!(gt[[1, 0, 0]], 0);
    assert_eq!(gt[[1, 0, 1]], 0);
    assert_eq!(gt[[1, 1, 0]], 0);
    assert_eq!(gt[[1, 1, 1]], 1);
}

#[test]
fn test_missing_qual_gets_fill() {
    let data = b"20\t14370\trs6\tG\tA\t.\tPASS\tDP=14\tGT\t0|0\t1|0\n\
                 20\t17330\t.\tT\tA\t3\tq10\tDP=11\tGT\t0|0\t0|1\n";
    let mut stream = ChunkStream::from_reader(&data[..], &scenario_config()).unwrap();
    let chunk = stream.next().unwrap().unwrap();
    let qual = chunk.get("variants/QUAL").unwrap().as_f32().unwrap();
    assert_eq!(qual[[0]], -1.0);
    assert_eq!(qual[[1]], 3.0);
    // missing values are not anomalies
    assert!(stream.warnings().is_empty());
}

#[test]
fn test_unknown_info_key_is_skipped() {
    let data = b"20\t14370\t.\tG\tA\t29\tPASS\tDP=5;FOO=bar;AF=0.1\tGT\t0|0\t1|0\n";
    let chunks = parse(data, &scenario_config());
    let dp = chunks[0].get("variants/DP").unwrap().as_i32().unwrap();
    assert_eq!(dp[[0]], 5);
}

#[test]
fn test_alt_overflow_keeps_first_three() {
    let data = b"20\t14370\t.\tG\tA,C,G,T\t29\tPASS\tDP=5\tGT\t0|0\t1|0\n";
    let chunks = parse(data, &scenario_config());
    let alt = chunks[0].get("variants/ALT").unwrap();
    assert_eq!(fixed_str(alt, &[0, 0]), "A");
    assert_eq!(fixed_str(alt, &[0, 1]), "C");
    assert_eq!(fixed_str(alt, &[0, 2]), "G");
}

#[test]
fn test_triploid_input_clipped_to_ploidy() {
    let data = b"20\t14370\t.\tG\tA\t29\tPASS\tDP=5\tGT\t0|1|2\t0|0\n";
    let chunks = parse(data, &scenario_config());
    let gt = chunks[0].get("calldata/GT").unwrap().as_i8().unwrap();
    assert_eq!(gt[[0, 0, 0]], 0);
    assert_eq!(gt[[0, 0, 1]], 1);
}

#[test]
fn test_three_records_two_chunks() {
    let data = b"20\t100\t.\tG\tA\t1\tPASS\tDP=1\tGT\t0|0\t0|0\n\
                 20\t200\t.\tG\tA\t2\tPASS\tDP=2\tGT\t0|1\t0|0\n\
                 20\t300\t.\tG\tA\t3\tPASS\tDP=3\tGT\t1|1\t0|0\n";
    let chunks = parse(data, &scenario_config());
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].len(), 2);
    assert_eq!(chunks[1].len(), 1);
    // every array in the tail chunk has leading dimension 1
    for (_, array) in chunks[1].iter() {
        assert_eq!(array.shape()[0], 1);
    }
    let gt = chunks[1].get("calldata/GT").unwrap().as_i8().unwrap();
    assert_eq!(gt.shape(), &[1, 2, 2]);
    assert_eq!(gt[[0, 0, 0]], 1);
}

#[test]
fn test_genotype_ploidy_slots_hold_fill_when_unparsed() {
    // haploid calls in a diploid configuration leave the second slot at fill
    let data = b"20\t100\t.\tG\tA\t1\tPASS\tDP=1\tGT\t0\t1\n";
    let chunks = parse(data, &scenario_config());
    let gt = chunks[0].get("calldata/GT").unwrap().as_i8().unwrap();
    assert_eq!(gt[[0, 0, 0]], 0);
    assert_eq!(gt[[0, 0, 1]], -1);
    assert_eq!(gt[[0, 1, 0]], 1);
    assert_eq!(gt[[0, 1, 1]], -1);
}

#[test]
fn test_numalt_counts_non_missing_alts() {
    let mut config = ParserConfig::default();
    config.chunk_length = 8;
    config.fields = vec!["variants/numalt".into(), "variants/ALT".into()];
    config.numbers.insert("variants/ALT".into(), 2);
    let data = b"1\t1\t.\tG\tA\t.\t.\t.\n\
                 1\t2\t.\tG\tA,C,T\t.\t.\t.\n\
                 1\t3\t.\tG\t.\t.\t.\t.\n";
    let chunks = parse(data, &config);
    let numalt = chunks[0].get("variants/numalt").unwrap().as_i32().unwrap();
    assert_eq!(numalt[[0]], 1);
    // counted past the cardinality cap
    assert_eq!(numalt[[1]], 3);
    assert_eq!(numalt[[2]], 0);
    let alt = chunks[0].get("variants/ALT").unwrap();
    assert_eq!(alt.shape(), &[3, 2, 1]);
}

#[test]
fn test_alt_number_one_squeezes() {
    let mut config = ParserConfig::default();
    config.chunk_length = 4;
    config.fields = vec!["variants/ALT".into()];
    config.numbers.insert("variants/ALT".into(), 1);
    config.types.insert("variants/ALT".into(), Dtype::Bytes(2));
    let data = b"1\t1\t.\tG\tAT\t.\t.\t.\n";
    let chunks = parse(data, &config);
    let alt = chunks[0].get("variants/ALT").unwrap();
    assert_eq!(alt.shape(), &[1, 2]);
    assert_eq!(fixed_str(alt, &[0]), "AT");
}

#[test]
fn test_info_number_one_squeezes_and_multi_value_does_not() {
    let mut config = ParserConfig::default();
    config.chunk_length = 4;
    config.fields = vec!["variants/DP".into(), "variants/AC".into()];
    config.types.insert("variants/DP".into(), Dtype::Int32);
    config.types.insert("variants/AC".into(), Dtype::Int32);
    config.numbers.insert("variants/AC".into(), 2);
    let data = b"1\t1\t.\tG\tA\t.\t.\tDP=9;AC=3,4\n";
    let chunks = parse(data, &config);
    assert_eq!(chunks[0].get("variants/DP").unwrap().shape(), &[1]);
    let ac = chunks[0].get("variants/AC").unwrap().as_i32().unwrap();
    assert_eq!(ac.shape(), &[1, 2]);
    assert_eq!(ac[[0, 0]], 3);
    assert_eq!(ac[[0, 1]], 4);
}

#[test]
fn test_info_flag_column() {
    let mut config = ParserConfig::default();
    config.chunk_length = 4;
    config.fields = vec!["variants/DB".into()];
    config.types.insert("variants/DB".into(), Dtype::Bool);
    let data = b"1\t1\t.\tG\tA\t.\t.\tDP=9;DB\n1\t2\t.\tG\tA\t.\t.\tDP=4\n";
    let chunks = parse(data, &config);
    let db = chunks[0].get("variants/DB").unwrap().as_bool().unwrap();
    assert_eq!(db[[0]], true);
    assert_eq!(db[[1]], false);
}

#[test]
fn test_unrequested_format_key_skipped_everywhere() {
    // HQ is announced by FORMAT but not configured; GT still lands for
    // every sample
    let mut config = scenario_config();
    config.chunk_length = 4;
    let data = b"20\t1\t.\tG\tA\t9\tPASS\tDP=3\tGT:HQ\t0|1:12,13\t1|1:14,15\n";
    let chunks = parse(data, &config);
    let gt = chunks[0].get("calldata/GT").unwrap().as_i8().unwrap();
    assert_eq!(gt[[0, 0, 0]], 0);
    assert_eq!(gt[[0, 0, 1]], 1);
    assert_eq!(gt[[0, 1, 0]], 1);
    assert_eq!(gt[[0, 1, 1]], 1);
}

#[test]
fn test_calldata_value_field_with_cardinality() {
    let mut config = ParserConfig::default();
    config.chunk_length = 4;
    config.n_samples = 2;
    config.fields = vec!["calldata/HQ".into(), "calldata/GQ".into()];
    config.types.insert("calldata/HQ".into(), Dtype::Int16);
    config.types.insert("calldata/GQ".into(), Dtype::Int16);
    config.numbers.insert("calldata/HQ".into(), 2);
    let data = b"1\t1\t.\tG\tA\t.\t.\t.\tGT:GQ:HQ\t0|0:48:51,51\t1|0:43:58,50\n";
    let chunks = parse(data, &config);
    let hq = chunks[0].get("calldata/HQ").unwrap().as_i16().unwrap();
    assert_eq!(hq.shape(), &[1, 2, 2]);
    assert_eq!(hq[[0, 0, 0]], 51);
    assert_eq!(hq[[0, 1, 1]], 50);
    // number == 1 squeezes the value axis
    let gq = chunks[0].get("calldata/GQ").unwrap().as_i16().unwrap();
    assert_eq!(gq.shape(), &[1, 2]);
    assert_eq!(gq[[0, 0]], 48);
    assert_eq!(gq[[0, 1]], 43);
}

#[test]
fn test_every_requested_row_written_or_fill() {
    // rows with values present are overwritten, rows without keep fills
    let mut config = ParserConfig::default();
    config.chunk_length = 4;
    config.fields = vec!["variants/AN".into()];
    config.types.insert("variants/AN".into(), Dtype::Int32);
    let data = b"1\t1\t.\tG\tA\t.\t.\tAN=6\n\
                 1\t2\t.\tG\tA\t.\t.\t.\n\
                 1\t3\t.\tG\tA\t.\t.\tAN=8\n";
    let chunks = parse(data, &config);
    let an = chunks[0].get("variants/AN").unwrap().as_i32().unwrap();
    assert_eq!(an[[0]], 6);
    assert_eq!(an[[1]], -1);
    assert_eq!(an[[2]], 8);
}
