//main.rs
use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use geomedoid::config::{GridConfig, IngestConfig, PamConfig, ParserKind, Seeding};
use geomedoid::output::{write_assignments, write_full_clustering, write_medoids};
use geomedoid::{load_points, ClusterAssigner, Clustering, Ingestor, MedoidSearch};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[clap(version = "0.2.0", author = "Stefan L. <stefan.lang@med.lu.se>")]
struct Opts {
    /// Debug logging (RUST_LOG takes precedence)
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Grid,
    Pam,
}

#[derive(Subcommand)]
enum Command {
    /// Cluster points and write one medoid per cluster
    Cluster {
        #[clap(short, long)]
        file: PathBuf,

        #[clap(short, long, value_enum, default_value = "point")]
        parser: ParserKind,

        /// Only read this many lines
        #[clap(long)]
        limit: Option<usize>,

        #[clap(short, long, value_enum, default_value = "grid")]
        strategy: Strategy,

        /// Grid cell height in degrees
        #[clap(long, default_value_t = 1.0)]
        lat_step: f64,

        /// Grid cell width in degrees
        #[clap(long, default_value_t = 1.0)]
        lon_step: f64,

        #[clap(short, long, default_value_t = 2500)]
        k: usize,

        #[clap(long, default_value_t = geomedoid::cluster::DEFAULT_MAX_ITERATIONS)]
        iterations: usize,

        #[clap(long, default_value_t = geomedoid::cluster::DEFAULT_SEED)]
        seed: u64,

        #[clap(long, value_enum, default_value = "plus-plus")]
        seeding: Seeding,

        /// Medoid candidates tried per cluster and iteration
        #[clap(long, default_value_t = geomedoid::cluster::DEFAULT_SAMPLE_LIMIT)]
        sample_limit: usize,

        /// Try every member as medoid (quadratic in the cluster size)
        #[clap(long)]
        exact: bool,

        #[clap(long, default_value_t = geomedoid::cluster::DEFAULT_MIN_IMPROVEMENT)]
        min_improvement: f64,

        /// Medoid file (clusterId,lat,lon)
        #[clap(short, long)]
        outfile: PathBuf,

        /// Also write pointId,clusterId for every input point
        #[clap(long)]
        assignments: Option<PathBuf>,

        /// Also write every cluster with its members (clusterId,pointId,lat,lon)
        #[clap(long)]
        full: Option<PathBuf>,
    },

    /// Map points to the cluster of their nearest medoid
    Assign {
        /// Medoid file written by `cluster`
        #[clap(short, long)]
        medoids: PathBuf,

        #[clap(short, long)]
        file: PathBuf,

        #[clap(short, long, value_enum, default_value = "point")]
        parser: ParserKind,

        /// Selected features (index<TAB>token), feature-record input only
        #[clap(long)]
        vocabulary: Option<PathBuf>,

        #[clap(long)]
        vocabulary_size: Option<usize>,

        /// Write the feature vocabulary used (index<TAB>token)
        #[clap(long)]
        vocabulary_out: Option<PathBuf>,

        #[clap(long)]
        limit: Option<usize>,

        /// pointId,clusterId output
        #[clap(short, long)]
        outfile: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    init_logging(opts.verbose);

    match opts.command {
        Command::Cluster {
            file,
            parser,
            limit,
            strategy,
            lat_step,
            lon_step,
            k,
            iterations,
            seed,
            seeding,
            sample_limit,
            exact,
            min_improvement,
            outfile,
            assignments,
            full,
        } => {
            let medoid_search = if exact {
                MedoidSearch::Exact
            } else {
                MedoidSearch::Sampled {
                    limit: sample_limit,
                    seed: geomedoid::cluster::DEFAULT_SAMPLE_SEED,
                }
            };
            let clustering = match strategy {
                Strategy::Grid => GridConfig {
                    lat_step,
                    lon_step,
                    medoid_search,
                }
                .build()?,
                Strategy::Pam => PamConfig {
                    k,
                    max_iterations: iterations,
                    seed,
                    seeding,
                    medoid_search,
                    min_improvement,
                }
                .build()?,
            };

            let loaded = load_points(&file, parser, limit)
                .with_context(|| format!("Failed to load points from {:?}", file))?;
            println!(
                "Loaded {} points from {} lines ({} errors)",
                loaded.records.len(),
                loaded.stats.processed,
                loaded.stats.errors
            );

            let partition = clustering.partition(&loaded.records)?;
            println!(
                "Assigned {} points into {} clusters",
                partition.labels.len(),
                partition.k()
            );

            write_medoids(&outfile, &partition.medoids)
                .with_context(|| format!("Failed to write {:?}", outfile))?;
            if let Some(path) = assignments {
                write_assignments(&path, &partition.assignments(&loaded.records))
                    .with_context(|| format!("Failed to write {:?}", path))?;
            }
            if let Some(path) = full {
                write_full_clustering(&path, &loaded.records, &partition)
                    .with_context(|| format!("Failed to write {:?}", path))?;
            }
        }

        Command::Assign {
            medoids,
            file,
            parser,
            vocabulary,
            vocabulary_size,
            vocabulary_out,
            limit,
            outfile,
        } => {
            let medoid_points = load_points(&medoids, ParserKind::Point, None)
                .with_context(|| format!("Failed to load medoids from {:?}", medoids))?
                .records;
            if let Some((pos, p)) = medoid_points
                .iter()
                .enumerate()
                .find(|(pos, p)| p.id != *pos as i64)
            {
                bail!(
                    "{:?} is not ordered by cluster id: line {} holds cluster {}",
                    medoids,
                    pos + 1,
                    p.id
                );
            }
            let assigner = ClusterAssigner::new(&medoid_points);
            println!("Loaded {} medoids", assigner.len());

            let config = IngestConfig {
                parser,
                limit,
                vocabulary,
                vocabulary_size,
            };
            let assigned = match parser {
                ParserKind::FeatureRecord => {
                    let mut ingestor = Ingestor::new(config.feature_parser()?);
                    let loaded = ingestor.load_file(&file, limit)?;
                    let out = assigner.assign_records(&loaded.records)?;
                    if let Some(path) = &vocabulary_out {
                        ingestor
                            .parser()
                            .vocabulary()
                            .write_tsv(path)
                            .with_context(|| format!("Failed to write {:?}", path))?;
                    }
                    println!(
                        "{} of {} records have a location",
                        out.iter().flatten().count(),
                        loaded.records.len()
                    );
                    write_assignments(&outfile, out.iter().flatten())?
                }
                _ => {
                    if vocabulary_out.is_some() {
                        bail!("--vocabulary-out needs the feature-record parser");
                    }
                    let loaded = config.load_points(&file)?;
                    let out = assigner.assign_all(&loaded.records)?;
                    write_assignments(&outfile, &out)?
                }
            };
            println!("Wrote {} assignments to {:?}", assigned, outfile);
        }
    }

    Ok(())
}
