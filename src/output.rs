//! Comma separated result files. None of them carries a header line, so a
//! medoid file can be read back with the `point` parser.

use crate::cluster::{ClusterAssignment, Medoid, Partition};
use crate::error::Result;
use crate::geo::GeoPoint;
use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::path::Path;

fn writer<P: AsRef<Path>>(path: P) -> Result<Writer<File>> {
    Ok(WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?)
}

/// One `clusterId,lat,lon` line per medoid.
pub fn write_medoids<P: AsRef<Path>>(path: P, medoids: &[Medoid]) -> Result<()> {
    let mut wtr = writer(&path)?;
    for m in medoids {
        wtr.write_record(&[
            m.cluster.to_string(),
            m.point.lat.to_string(),
            m.point.lon.to_string(),
        ])?;
    }
    wtr.flush()?;
    tracing::info!(medoids = medoids.len(), "wrote {:?}", path.as_ref());
    Ok(())
}

/// One `pointId,clusterId` line per assignment. Unassigned records are
/// left out.
pub fn write_assignments<'a, P, I>(path: P, assignments: I) -> Result<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a ClusterAssignment>,
{
    let mut wtr = writer(&path)?;
    let mut written = 0;
    for a in assignments {
        wtr.write_record(&[a.point.to_string(), a.cluster.to_string()])?;
        written += 1;
    }
    wtr.flush()?;
    tracing::info!(assignments = written, "wrote {:?}", path.as_ref());
    Ok(written)
}

/// Every cluster with its members: `clusterId,pointId,lat,lon`, grouped by
/// cluster, the medoid first, then the members in input order.
pub fn write_full_clustering<P: AsRef<Path>>(
    path: P,
    points: &[GeoPoint],
    partition: &Partition,
) -> Result<()> {
    let mut members: Vec<Vec<&GeoPoint>> = vec![Vec::new(); partition.k()];
    for (p, &label) in points.iter().zip(&partition.labels) {
        members[label].push(p);
    }

    let mut wtr = writer(&path)?;
    for (m, members) in partition.medoids.iter().zip(&members) {
        let medoid = &m.point;
        let rest = members.iter().filter(|p| ***p != *medoid);
        for p in std::iter::once(medoid).chain(rest.copied()) {
            wtr.write_record(&[
                m.cluster.to_string(),
                p.id.to_string(),
                p.lat.to_string(),
                p.lon.to_string(),
            ])?;
        }
    }
    wtr.flush()?;
    tracing::info!(clusters = partition.k(), "wrote {:?}", path.as_ref());
    Ok(())
}
