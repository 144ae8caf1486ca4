//! CLI Tooling
//!
//! Command-line interface over a `VersionedDocumentStore`. Every command
//! returns its output as a string; the binary only prints it.

use crate::archive::ArchiveCodec;
use crate::classify::ExtensionClassifier;
use crate::config::{ConfigLoader, DoctreeConfig, StorageBackend};
use crate::document::VersionedDocumentStore;
use crate::error::{ApiError, DocumentError, StorageError};
use crate::store::{ContentStore, MemoryContentStore, MemoryMetadataStore, MetadataStore, SledStores};
use crate::tree::DocumentNode;
use crate::types::{DocumentId, PATH_SEPARATOR, ROOT_ID};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Doctree CLI - hierarchical document store with version history
#[derive(Parser)]
#[command(name = "doctree")]
#[command(about = "Hierarchical document store with per-file version history")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Store directory (overrides storage.data_dir)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Fold command-line flags into a loaded configuration
    pub fn apply_overrides(&self, config: &mut DoctreeConfig) {
        if let Some(dir) = &self.data_dir {
            config.storage.data_dir = Some(dir.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.logging.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.clone());
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a folder
    Mkdir {
        /// Absolute path of the new folder
        path: String,
        /// Create missing parent folders; an existing folder is not an error
        #[arg(short, long)]
        parents: bool,
    },
    /// Create an empty text file
    Touch {
        /// Absolute path of the new file
        path: String,
    },
    /// Store a local file, archiving the previous content if the path exists
    Put {
        /// Local file to read
        source: PathBuf,
        /// Absolute destination path in the store
        path: String,
    },
    /// Print the content of a file or version node
    Cat {
        path: String,
    },
    /// List a folder
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Find documents whose path contains a fragment (case-insensitive)
    Find {
        fragment: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Delete a document and everything below it
    Rm {
        path: String,
    },
    /// List the stored versions of a file
    Versions {
        path: String,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Export a subtree to an archive file
    Export {
        path: String,
        /// Archive file to write
        output: PathBuf,
    },
    /// Import an archive file into a folder
    Import {
        /// Archive file to read
        archive: PathBuf,
        /// Target folder in the store
        #[arg(default_value = "/")]
        folder: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

/// CLI context owning the opened document store
pub struct CliContext {
    store: VersionedDocumentStore,
    config: DoctreeConfig,
    sled: Option<SledStores>,
}

impl CliContext {
    /// Load configuration and open the configured store
    pub fn new(config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self, ApiError> {
        let mut config = ConfigLoader::load_optional(config_path.as_deref())?;
        if let Some(dir) = data_dir {
            config.storage.data_dir = Some(dir);
        }
        Self::from_config(config)
    }

    /// Open the store described by an already-loaded configuration
    pub fn from_config(config: DoctreeConfig) -> Result<Self, ApiError> {
        let (metadata, content, sled) =
            match config.storage.backend {
                StorageBackend::Sled => {
                    let path = config.storage.resolve_data_dir()?;
                    let stores = SledStores::open(&path)?;
                    (
                        stores.metadata.clone() as Arc<dyn MetadataStore>,
                        stores.content.clone() as Arc<dyn ContentStore>,
                        Some(stores),
                    )
                }
                StorageBackend::Memory => (
                    Arc::new(MemoryMetadataStore::new()) as Arc<dyn MetadataStore>,
                    Arc::new(MemoryContentStore::new()) as Arc<dyn ContentStore>,
                    None,
                ),
            };

        let store = VersionedDocumentStore::open(
            metadata,
            content,
            Arc::new(ExtensionClassifier::new()),
            config.versions,
        )?;
        info!(
            backend = ?config.storage.backend,
            nodes = store.node_count(),
            "Opened document store"
        );
        Ok(Self { store, config, sled })
    }

    /// Get a reference to the underlying store
    pub fn store(&self) -> &VersionedDocumentStore {
        &self.store
    }

    pub fn config(&self) -> &DoctreeConfig {
        &self.config
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let output = self.execute_inner(command)?;
        if is_mutation(command) {
            self.flush()?;
        }
        Ok(output)
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Mkdir { path, parents } => {
                let node = if *parents {
                    self.mkdir_parents(path)?
                } else {
                    let (parent, name) = self.split_existing_parent(path)?;
                    self.store.create_folder(parent.id, &name)?
                };
                Ok(format!("Created folder {} (id {})", path, node.id))
            }
            Commands::Touch { path } => {
                let (parent, name) = self.split_existing_parent(path)?;
                let node = self.store.create_file(parent.id, &name)?;
                Ok(format!("Created file {} (id {})", path, node.id))
            }
            Commands::Put { source, path } => {
                let bytes = std::fs::read(source).map_err(StorageError::from)?;
                let (parent, name) = self.split_existing_parent(path)?;
                let node = self.store.store_document(parent.id, &name, &bytes)?;
                Ok(format!(
                    "Stored {} (id {}, {} bytes, {})",
                    path,
                    node.id,
                    node.size,
                    node.mime_type.as_deref().unwrap_or("-")
                ))
            }
            Commands::Cat { path } => {
                let node = self.resolve(path)?;
                let bytes = self.store.content(node.id)?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            Commands::Ls { path, format } => {
                let node = self.resolve(path)?;
                let nodes = if node.is_folder {
                    self.store.children(node.id)?
                } else {
                    vec![node]
                };
                self.format_nodes(&nodes, format)
            }
            Commands::Find { fragment, format } => {
                let nodes: Vec<DocumentNode> = self.store.list_by_fuzzy_path(fragment).collect();
                self.format_nodes(&nodes, format)
            }
            Commands::Rm { path } => {
                let node = self.resolve(path)?;
                self.store.delete_document(node.id)?;
                Ok(format!("Deleted {}", path))
            }
            Commands::Versions { path, format } => {
                let node = self.resolve(path)?;
                let versions = self.store.versions_of(node.id)?;
                self.format_nodes(&versions, format)
            }
            Commands::Export { path, output } => {
                let node = self.resolve(path)?;
                let codec = ArchiveCodec::with_config(&self.store, self.config.archive);
                let bytes = codec.to_archive(node.id)?;
                std::fs::write(output, &bytes).map_err(StorageError::from)?;
                Ok(format!(
                    "Exported {} to {} ({} bytes)",
                    path,
                    output.display(),
                    bytes.len()
                ))
            }
            Commands::Import { archive, folder } => {
                let bytes = std::fs::read(archive).map_err(StorageError::from)?;
                let target = self.resolve(folder)?;
                let codec = ArchiveCodec::with_config(&self.store, self.config.archive);
                let summary = codec.from_archive(target.id, &bytes)?;
                Ok(format!(
                    "Imported {} into {}: {} folders created, {} folders reused, {} files stored, {} versions restored, {} versions skipped",
                    archive.display(),
                    folder,
                    summary.folders_created,
                    summary.folders_existing,
                    summary.files_stored,
                    summary.versions_restored,
                    summary.versions_skipped
                ))
            }
            Commands::Config => ConfigLoader::to_toml(&self.config),
        }
    }

    fn flush(&self) -> Result<(), ApiError> {
        if let Some(stores) = &self.sled {
            stores.flush()?;
        }
        Ok(())
    }

    fn resolve(&self, path: &str) -> Result<DocumentNode, ApiError> {
        self.store
            .document_from_path(path)
            .ok_or_else(|| DocumentError::NotFound(path.to_string()).into())
    }

    /// Resolve the parent folder of `path` and return it with the last segment
    fn split_existing_parent(&self, path: &str) -> Result<(DocumentNode, String), ApiError> {
        let (parent_path, name) = split_path(path)?;
        let parent = self.resolve(&parent_path)?;
        Ok((parent, name))
    }

    fn mkdir_parents(&self, path: &str) -> Result<DocumentNode, ApiError> {
        if !path.starts_with(PATH_SEPARATOR) {
            return Err(ApiError::PathError(format!("path must be absolute: {}", path)));
        }
        let mut current: DocumentId = ROOT_ID;
        let mut node = self.store.root();
        for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            node = match self.store.child_by_name(current, segment) {
                Some(existing) if existing.is_folder => existing,
                Some(existing) => {
                    return Err(DocumentError::NotAFolder(existing.name).into());
                }
                None => self.store.create_folder(current, segment)?,
            };
            current = node.id;
        }
        Ok(node)
    }

    fn format_nodes(&self, nodes: &[DocumentNode], format: &str) -> Result<String, ApiError> {
        match format {
            "json" => {
                let rows = nodes
                    .iter()
                    .map(|node| -> Result<serde_json::Value, DocumentError> {
                        Ok(json!({
                            "id": node.id,
                            "path": self.store.path_of(node.id)?,
                            "name": node.name,
                            "kind": node_kind(node),
                            "size": node.size,
                            "mime_type": node.mime_type,
                            "modified_at": node.modified_at.to_rfc3339(),
                        }))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                serde_json::to_string_pretty(&rows)
                    .map_err(|e| ApiError::ConfigError(format!("Failed to render JSON: {}", e)))
            }
            "text" => {
                let mut table = Table::new();
                table.load_preset(comfy_table::presets::UTF8_FULL);
                table.set_header(vec!["Id", "Name", "Kind", "Size", "Modified"]);
                for node in nodes {
                    table.add_row(vec![
                        node.id.to_string(),
                        node.name.clone(),
                        node_kind(node).to_string(),
                        node.size.to_string(),
                        node.modified_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    ]);
                }
                Ok(table.to_string())
            }
            other => Err(ApiError::ConfigError(format!(
                "Invalid output format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }
}

fn is_mutation(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Mkdir { .. }
            | Commands::Touch { .. }
            | Commands::Put { .. }
            | Commands::Rm { .. }
            | Commands::Import { .. }
    )
}

fn node_kind(node: &DocumentNode) -> &'static str {
    if node.is_folder {
        "folder"
    } else if node.is_version {
        "version"
    } else {
        "file"
    }
}

/// Split an absolute path into its parent path and last segment
pub fn split_path(path: &str) -> Result<(String, String), ApiError> {
    if !path.starts_with(PATH_SEPARATOR) {
        return Err(ApiError::PathError(format!("path must be absolute: {}", path)));
    }
    let trimmed = path.trim_end_matches(PATH_SEPARATOR);
    match trimmed.rsplit_once(PATH_SEPARATOR) {
        Some((_, name)) if name.is_empty() => {
            Err(ApiError::PathError(format!("path has no final segment: {}", path)))
        }
        Some((parent, name)) => {
            let parent = if parent.is_empty() { "/" } else { parent };
            Ok((parent.to_string(), name.to_string()))
        }
        None => Err(ApiError::PathError(format!("path has no final segment: {}", path))),
    }
}
