use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::services::UuidTable;

#[derive(Parser)]
#[command(name = "freight-ops")]
#[command(about = "Consolidated cargo operations: supplier status, notifications and maintenance", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Flags shared by the batch repair commands
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Only touch suppliers of this container
    #[arg(long = "contenedor")]
    pub contenedor_id: Option<i64>,

    /// Plan and report without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Write the planned or applied changes as CSV
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API (default)
    Serve,

    /// Run queue workers until interrupted
    Worker {
        /// Overrides `queue.workers`
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Re-derive pre-arrival supplier statuses from their raw fields
    UpdateEstadosProveedor {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Advance supplier statuses from confirmed payments
    SyncTracking {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Fill tracking rows that lost their estado
    FixTrackingNulos {
        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Assign UUIDs to legacy rows
    BackfillUuids {
        #[arg(long, value_enum)]
        table: UuidTable,

        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Build the deduplicated client registry from quotations and course orders
    SyncClientes {
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Enqueue a job from its JSON payload
    EnqueueJob {
        /// e.g. '{"kind":"send_welcome","cotizacion_id":12}'
        payload: String,
    },

    /// Send the labelling bundle for a quotation now, bypassing the queue
    ForceSendRotulado {
        cotizacion: i64,

        /// Suppliers to include; every supplier when omitted
        #[arg(long = "proveedor")]
        proveedores: Vec<i64>,
    },

    /// Create a Moodle course and print its id
    CreateCourse {
        #[arg(long)]
        fullname: String,

        #[arg(long)]
        shortname: String,

        #[arg(long = "category", default_value_t = 1)]
        category_id: i64,
    },

    /// Write a course certificate PDF
    RenderConstancia {
        pedido_curso: i64,

        #[arg(long)]
        out: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_flags() {
        let cli = Cli::try_parse_from([
            "freight-ops",
            "sync-tracking",
            "--contenedor",
            "12",
            "--dry-run",
            "--report",
            "out.csv",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::SyncTracking { batch }) => {
                assert_eq!(batch.contenedor_id, Some(12));
                assert!(batch.dry_run);
                assert_eq!(batch.report, Some(PathBuf::from("out.csv")));
            }
            _ => panic!("expected sync-tracking"),
        }
    }

    #[test]
    fn test_parse_backfill_table() {
        let cli =
            Cli::try_parse_from(["freight-ops", "backfill-uuids", "--table", "proveedores"]).unwrap();

        match cli.command {
            Some(Commands::BackfillUuids { table, dry_run, .. }) => {
                assert_eq!(table, UuidTable::Proveedores);
                assert!(!dry_run);
            }
            _ => panic!("expected backfill-uuids"),
        }
    }

    #[test]
    fn test_parse_repeated_proveedor() {
        let cli = Cli::try_parse_from([
            "freight-ops",
            "force-send-rotulado",
            "70",
            "--proveedor",
            "7",
            "--proveedor",
            "8",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::ForceSendRotulado {
                cotizacion,
                proveedores,
            }) => {
                assert_eq!(cotizacion, 70);
                assert_eq!(proveedores, vec![7, 8]);
            }
            _ => panic!("expected force-send-rotulado"),
        }
    }

    #[test]
    fn test_parse_create_course_default_category() {
        let cli = Cli::try_parse_from([
            "freight-ops",
            "create-course",
            "--fullname",
            "Importación II",
            "--shortname",
            "IMP-2",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::CreateCourse {
                shortname,
                category_id,
                ..
            }) => {
                assert_eq!(shortname, "IMP-2");
                assert_eq!(category_id, 1);
            }
            _ => panic!("expected create-course"),
        }
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["freight-ops"]).unwrap();
        assert!(cli.command.is_none());
    }
}
