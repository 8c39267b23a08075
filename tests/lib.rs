use std::fs;
use std::path::{Path, PathBuf};
use std::str;

use itertools::Itertools;
use rust_htslib::bcf;
use rust_htslib::bcf::Read as BCFRead;

use fusion_merge::errors::Error;
use fusion_merge::MergerBuilder;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn resource(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/resources/fusions")
        .join(name)
}

fn fusion_callers() -> Vec<(String, PathBuf)> {
    ["manta", "starfusion", "arriba"]
        .iter()
        .map(|name| (name.to_string(), resource(&format!("{}.vcf", name))))
        .collect()
}

fn invalid_resource(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/resources/invalid")
        .join(name)
}

fn try_merge(sources: &[(String, PathBuf)], output: &Path) -> anyhow::Result<()> {
    init_logger();
    let (names, paths): (Vec<String>, Vec<PathBuf>) = sources.iter().cloned().unzip();
    MergerBuilder::default()
        .calling_sources(&names, &paths)?
        .annotation_field(Some("TESTANN".to_owned()))
        .output(output)
        .build()?
        .merge()
}

fn merge(sources: &[(String, PathBuf)], output: &Path) {
    try_merge(sources, output).unwrap();
}

/// Merge the given invalid input alone and return the resulting error.
fn merge_error(name: &str) -> Error {
    let tmp = tempfile::tempdir().unwrap();
    let err = try_merge(
        &[("arriba".to_owned(), invalid_resource(name))],
        &tmp.path().join("merged.vcf"),
    )
    .unwrap_err();
    err.downcast_ref::<Error>()
        .unwrap_or_else(|| panic!("unexpected error: {:?}", err))
        .clone()
}

#[derive(Debug)]
struct Call {
    chrom: String,
    pos: i64,
    id: String,
    alt: String,
    filters: Vec<String>,
    src: Vec<String>,
    idsrc: Vec<String>,
    mateid: Option<String>,
    cipos: Vec<i32>,
    testann: Vec<String>,
    pr: i32,
    prsrc: Vec<i32>,
    sr: i32,
    srsrc: Vec<i32>,
}

fn info_strings(record: &bcf::Record, tag: &[u8]) -> Vec<String> {
    record
        .info(tag)
        .string()
        .unwrap()
        .map(|values| {
            values
                .iter()
                .map(|v| str::from_utf8(v).unwrap().to_owned())
                .collect()
        })
        .unwrap_or_default()
}

fn format_integers(record: &bcf::Record, tag: &[u8]) -> Vec<i32> {
    let values = record.format(tag).integer().unwrap();
    values[0]
        .iter()
        .cloned()
        .take_while(|v| *v != i32::MIN + 1)
        .collect()
}

fn read_calls(path: &Path) -> Vec<Call> {
    let mut reader = bcf::Reader::from_path(path).unwrap();
    let mut calls = Vec::new();
    for record in reader.records() {
        let record = record.unwrap();
        let header = record.header();
        let chrom = str::from_utf8(header.rid2name(record.rid().unwrap()).unwrap())
            .unwrap()
            .to_owned();
        let filters = record
            .filters()
            .map(|id| str::from_utf8(&header.id_to_name(id)).unwrap().to_owned())
            .collect_vec();
        let alleles = record.alleles();
        let alt = str::from_utf8(alleles[1]).unwrap().to_owned();
        let cipos = record
            .info(b"CIPOS")
            .integer()
            .unwrap()
            .map(|values| values.to_vec())
            .unwrap_or_default();
        let pr = format_integers(&record, b"PR");
        let sr = format_integers(&record, b"SR");
        calls.push(Call {
            chrom,
            pos: record.pos() + 1,
            id: str::from_utf8(&record.id()).unwrap().to_owned(),
            alt,
            filters,
            src: info_strings(&record, b"SRC"),
            idsrc: info_strings(&record, b"IDSRC"),
            mateid: info_strings(&record, b"MATEID").into_iter().next(),
            cipos,
            testann: info_strings(&record, b"s2_TESTANN"),
            pr: pr[0],
            prsrc: format_integers(&record, b"PRSRC"),
            sr: sr[0],
            srsrc: format_integers(&record, b"SRSRC"),
        });
    }
    calls
}

fn find<'a>(calls: &'a [Call], chrom: &str, pos: i64, id_prefix: &str) -> &'a Call {
    calls
        .iter()
        .find(|call| call.chrom == chrom && call.pos == pos && call.id.starts_with(id_prefix))
        .unwrap_or_else(|| panic!("no call {}:{} {}", chrom, pos, id_prefix))
}

#[test]
fn test_merge_fusion_callers() {
    let tmp = tempfile::tempdir().unwrap();
    let output = tmp.path().join("merged.vcf");
    merge(&fusion_callers(), &output);
    let calls = read_calls(&output);

    assert_eq!(calls.len(), 40);

    let call = find(&calls, "22", 24334571, "MantaBND:244");
    assert_eq!(call.id, "MantaBND:244:0:1:0:0:0:1");
    assert_eq!(call.alt, "A[9:84867241[");
    assert_eq!(call.src, vec!["manta", "starfusion", "arriba"]);
    assert_eq!(
        call.idsrc,
        vec![
            "MantaBND%3A244%3A0%3A1%3A0%3A0%3A0%3A1",
            "2d095596-d654-47e4-bb01-f6cc093dcf4a",
            "2eb133b5-8951-4678-9a3e-1b44a86c7edb",
        ]
    );
    assert_eq!(
        call.mateid,
        Some("MantaBND%3A244%3A0%3A1%3A0%3A0%3A0%3A0".to_owned())
    );
    assert_eq!(call.filters, vec!["PASS"]);
    assert_eq!(call.cipos, vec![0, 3]);
    assert_eq!(call.pr, 3);
    assert_eq!(call.prsrc, vec![3, 6, 3]);
    assert_eq!(call.sr, 20);
    assert_eq!(call.srsrc, vec![20, 22, 19]);
    // annotations of the duplicated arriba call are kept
    assert_eq!(call.testann.len(), 2);

    let mate = find(&calls, "9", 84867241, "MantaBND:244");
    assert_eq!(mate.src, vec!["manta", "starfusion", "arriba"]);
    assert_eq!(mate.prsrc, vec![3, 6, 3]);

    let call = find(&calls, "22", 24334573, "230637aa");
    assert_eq!(call.src, vec!["starfusion", "arriba"]);
    assert_eq!(
        call.idsrc,
        vec![
            "230637aa-0101-42cd-82ba-56dec3b44671",
            "5fe30e25-92c7-4828-9527-230b226756cf",
        ]
    );
    assert!(call.filters.is_empty());
    assert_eq!(call.cipos, vec![0, 0]);
    assert_eq!(call.prsrc, vec![6, 6]);
    assert_eq!(call.srsrc, vec![3, 3]);
    let mate = find(&calls, "9", 84861040, "96ac47f1");
    assert_eq!(mate.src, vec!["starfusion", "arriba"]);

    // calls of a single source keep their own values
    let call = find(&calls, "1", 154944376, "MantaBND:20");
    assert_eq!(call.src, vec!["manta"]);
    assert_eq!(call.filters, vec!["s0_Imprecise"]);
    assert_eq!(call.cipos, vec![-81, 82]);
    let call = find(&calls, "17", 20204330, "MantaBND:120");
    assert_eq!(call.filters, vec!["s0_Local"]);
    let call = find(&calls, "1", 154944457, "493a8037");
    assert_eq!(call.src, vec!["arriba"]);
    assert_eq!(call.testann.len(), 2);
}

#[test]
fn test_merged_call_invariants() {
    let tmp = tempfile::tempdir().unwrap();
    let output = tmp.path().join("merged.vcf");
    merge(&fusion_callers(), &output);
    let calls = read_calls(&output);

    for call in &calls {
        assert_eq!(call.src.len(), call.idsrc.len(), "{:?}", call);
        assert_eq!(call.src.len(), call.prsrc.len(), "{:?}", call);
        assert_eq!(call.src.len(), call.srsrc.len(), "{:?}", call);
        assert_eq!(call.pr, call.prsrc[0], "{:?}", call);
        assert_eq!(call.sr, call.srsrc[0], "{:?}", call);
        assert_eq!(call.src.iter().unique().count(), call.src.len());
    }

    for (a, b) in calls.iter().tuple_windows() {
        assert!(
            (a.chrom.as_str(), a.pos) <= (b.chrom.as_str(), b.pos),
            "{}:{} written before {}:{}",
            a.chrom,
            a.pos,
            b.chrom,
            b.pos
        );
    }

    let ids = calls
        .iter()
        .filter(|call| call.chrom == "21" && call.pos == 8258375)
        .map(|call| &call.id[..8])
        .collect_vec();
    assert_eq!(ids, vec!["811d49e9", "05d88c5a"]);
}

#[test]
fn test_merge_permuted_input() {
    let tmp = tempfile::tempdir().unwrap();
    let arriba = fs::read_to_string(resource("arriba.vcf")).unwrap();
    let (header, records): (Vec<&str>, Vec<&str>) =
        arriba.lines().partition(|line| line.starts_with('#'));
    let permuted = tmp.path().join("arriba.vcf");
    fs::write(
        &permuted,
        header
            .into_iter()
            .chain(records.into_iter().rev())
            .map(|line| format!("{}\n", line))
            .join(""),
    )
    .unwrap();

    let expected = tmp.path().join("merged.vcf");
    merge(&fusion_callers(), &expected);

    let mut sources = fusion_callers();
    sources[2].1 = permuted;
    let output = tmp.path().join("merged.permuted.vcf");
    merge(&sources, &output);

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        fs::read_to_string(&expected).unwrap()
    );
}

#[test]
fn test_merge_source_with_itself() {
    let tmp = tempfile::tempdir().unwrap();
    let output = tmp.path().join("merged.bcf");
    let sources = vec![
        ("manta".to_owned(), resource("manta.vcf")),
        ("manta_copy".to_owned(), resource("manta.vcf")),
    ];
    merge(&sources, &output);
    let calls = read_calls(&output);

    assert_eq!(calls.len(), 16);
    for call in &calls {
        assert_eq!(call.src, vec!["manta", "manta_copy"]);
        assert_eq!(call.idsrc[0], call.idsrc[1]);
        assert_eq!(call.prsrc[0], call.prsrc[1]);
    }
}

#[test]
fn test_merge_count_mismatch() {
    let err = MergerBuilder::default()
        .calling_sources(
            &["manta".to_owned(), "arriba".to_owned()],
            &[resource("manta.vcf")],
        )
        .unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::SourceInputCountMismatch {
            sources: 2,
            inputs: 1
        })
    );
}

#[test]
fn test_merge_missing_input() {
    init_logger();
    let tmp = tempfile::tempdir().unwrap();
    let result = MergerBuilder::default()
        .calling_sources(&["manta".to_owned()], &[resource("missing.vcf")])
        .unwrap()
        .output(tmp.path().join("merged.vcf"))
        .build()
        .unwrap()
        .merge();
    assert!(result.is_err());
}

#[test]
fn test_merge_malformed_notation() {
    match merge_error("malformed_notation.vcf") {
        Error::MalformedRecord {
            source_name,
            chrom,
            pos,
            ..
        } => {
            assert_eq!(source_name, "arriba");
            assert_eq!(chrom, "22");
            assert_eq!(pos, 24334573);
        }
        err => panic!("unexpected error: {}", err),
    }
}

#[test]
fn test_merge_multiple_alt_alleles() {
    assert_eq!(
        merge_error("multiple_alts.vcf"),
        Error::MalformedRecord {
            source_name: "arriba".to_owned(),
            chrom: "22".to_owned(),
            pos: 24334573,
            msg: "expected one ALT allele, found 2".to_owned(),
        }
    );
}

#[test]
fn test_merge_mateid_without_id() {
    assert_eq!(
        merge_error("mateid_without_id.vcf"),
        Error::BreakendMateidWithoutRecid {
            source_name: "arriba".to_owned(),
            chrom: "22".to_owned(),
            pos: 24334573,
        }
    );
}

#[test]
fn test_merge_incompatible_svtype() {
    let tmp = tempfile::tempdir().unwrap();
    let err = try_merge(
        &[
            ("manta".to_owned(), resource("manta.vcf")),
            ("other".to_owned(), invalid_resource("svtype_number.vcf")),
        ],
        &tmp.path().join("merged.vcf"),
    )
    .unwrap_err();
    match err.downcast_ref::<Error>() {
        Some(Error::IncompatibleFieldDeclaration {
            id,
            first_source,
            source_name,
            ..
        }) => {
            assert_eq!(id, "SVTYPE");
            assert_eq!(first_source, "manta");
            assert_eq!(source_name, "other");
        }
        _ => panic!("unexpected error: {:?}", err),
    }
}
