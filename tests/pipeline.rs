use geomedoid::output::{write_assignments, write_medoids};
use geomedoid::{
    load_feature_records, load_points, ClusterAssigner, Clustering, ClusteringStrategy, Error,
    GridClustering, Ingestor, PamClustering, ParserKind, PointParser, Vocabulary,
};
use std::collections::HashSet;
use std::fs;
use std::io::Write;

fn write_file(lines: &[&str]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

#[test]
fn grid_cluster_then_assign() {
    let input = write_file(&["1,0,0", "2,0,1", "3,89,0"]);
    let loaded = load_points(input.path(), ParserKind::Point, None).unwrap();
    assert_eq!(loaded.records.len(), 3);
    assert_eq!(loaded.stats.errors, 0);

    let grid = GridClustering::new(1.0, 1.0).unwrap();
    let partition = grid.partition(&loaded.records).unwrap();
    assert!(partition.k() >= 2);

    let assigner = ClusterAssigner::from_medoids(&partition.medoids);
    for (p, &label) in loaded.records.iter().zip(&partition.labels) {
        let cluster = assigner.assign(p).unwrap();
        assert_eq!(cluster, label);
        let medoid = assigner.medoid(cluster).unwrap();
        assert_eq!(grid.cell(medoid), (p.lat.floor() as i64, p.lon.floor() as i64));
    }
}

#[test]
fn medoid_file_feeds_a_later_run() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(&[
        "1,10.0,10.0",
        "2,10.2,10.1",
        "3,-20.0,50.0",
        "4,-20.3,50.2",
        "5,60.0,-100.0",
        "6,60.1,-100.1",
    ]);
    let loaded = load_points(input.path(), ParserKind::Point, None).unwrap();
    let medoids = PamClustering::new(3).cluster(&loaded.records).unwrap();

    let medoid_file = dir.path().join("medoids.csv");
    write_medoids(&medoid_file, &medoids).unwrap();

    let reread = Ingestor::new(PointParser::new())
        .load_file(&medoid_file, None)
        .unwrap();
    assert_eq!(reread.records.len(), 3);
    for (m, p) in medoids.iter().zip(&reread.records) {
        assert_eq!(p.id, m.cluster as i64);
        assert_eq!((p.lat, p.lon), (m.point.lat, m.point.lon));
    }

    let fresh = ClusterAssigner::from_medoids(&medoids);
    let reloaded = ClusterAssigner::new(&reread.records);
    let queries = write_file(&["10,10.1,10.0", "11,-19.0,49.0", "12,59.0,-99.0"]);
    let queries = load_points(queries.path(), ParserKind::Point, None).unwrap();
    let a = fresh.assign_all(&queries.records).unwrap();
    let b = reloaded.assign_all(&queries.records).unwrap();
    assert_eq!(a, b);
    let clusters: HashSet<usize> = a.iter().map(|x| x.cluster).collect();
    assert_eq!(clusters.len(), 3);

    let out = dir.path().join("assignments.csv");
    assert_eq!(write_assignments(&out, &a).unwrap(), 3);
    assert_eq!(fs::read_to_string(&out).unwrap().lines().count(), 3);
}

#[test]
fn load_counts_errors_and_respects_limit() {
    let input = write_file(&[
        "1,0.5,0.5",
        "2,north,0.5",
        "",
        "3,95.0,0.5",
        "x,1.0,1.0",
        "4,1.5,1.5",
        "5,2.5,2.5",
    ]);
    let all = load_points(input.path(), ParserKind::Point, None).unwrap();
    assert_eq!(all.records.len(), 3);
    assert_eq!(all.stats.processed, 7);
    assert_eq!(all.stats.errors, 4);

    let limited = load_points(input.path(), ParserKind::Point, Some(2)).unwrap();
    assert_eq!(limited.stats.processed, 2);
    assert_eq!(limited.records.len(), 1);
}

#[test]
fn unreadable_source_is_fatal() {
    let err = load_points("/nonexistent/points.csv", ParserKind::Point, None).unwrap_err();
    assert!(matches!(err, Error::SourceUnreadable { .. }));
}

#[test]
fn feature_records_with_vocabulary() {
    let input = write_file(&[
        "1,a,48.85,2.35,Eiffel tower paris",
        "2,b,-200,-200,paris",
        "3,c,41.90,12.49,colosseum rome",
    ]);
    let vocabulary = Vocabulary::from_tokens(["paris", "rome"]);
    let loaded = load_feature_records(input.path(), Some(vocabulary), None).unwrap();
    assert_eq!(loaded.stats.errors, 0);
    assert_eq!(loaded.records.len(), 3);
    assert_eq!(loaded.records[0].features.iter().copied().collect::<Vec<_>>(), vec![0]);
    assert!(loaded.records[1].location.is_none());
    assert_eq!(loaded.records[1].latitude(), -200.0);

    let assigner = ClusterAssigner::new(&[
        geomedoid::GeoPoint::new(0, 48.0, 2.0),
        geomedoid::GeoPoint::new(1, 42.0, 12.0),
    ]);
    let out = assigner.assign_records(&loaded.records).unwrap();
    assert_eq!(out[0].map(|a| a.cluster), Some(0));
    assert_eq!(out[1], None);
    assert_eq!(out[2].map(|a| a.cluster), Some(1));
}

#[test]
fn pam_contract_and_errors() {
    let points: Vec<geomedoid::GeoPoint> = (0..50)
        .map(|i| geomedoid::GeoPoint::new(i, (i % 10) as f64 * 3.0, (i / 10) as f64 * 7.0))
        .collect();
    let strategy = ClusteringStrategy::Pam(PamClustering::new(7).with_max_iterations(20));
    let partition = strategy.partition(&points).unwrap();
    assert_eq!(partition.k(), 7);
    assert_eq!(partition.labels.len(), points.len());
    let summary = partition.summary();
    assert_eq!(summary.empty, 0);
    assert_eq!(summary.clusters, 7);

    let same_spot = vec![geomedoid::GeoPoint::new(1, 5.0, 5.0); 4];
    assert!(matches!(
        PamClustering::new(2).partition(&same_spot),
        Err(Error::InsufficientData {
            requested: 2,
            distinct: 1
        })
    ));
    assert!(matches!(
        PamClustering::new(2).partition(&[]),
        Err(Error::EmptyInput)
    ));
}
