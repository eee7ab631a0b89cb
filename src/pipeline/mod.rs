pub mod diagnosis; // Prompt → inference → reconcile
pub mod ingestion; // File checks + blob upload
