//! Subcommands and their output.

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use issue_portal::{AttachmentOutcome, PortalConfig, PortalService};
use issue_portal_sdk::{BoundingBox, CreateRequestPayload, FilePart, Palette};
use mime::Mime;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum Command {
    /// Show the tenant and its branding
    Tenant,
    /// Show the current session
    Session,
    /// List issue categories
    Categories,
    /// List the signed-in resident's requests
    Requests,
    /// Show one request
    Request {
        id: String,
    },
    /// Show the status history of one request
    Timeline {
        id: String,
    },
    /// List public issues inside a bounding box
    Issues {
        /// `minLng,minLat,maxLng,maxLat`
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        bbox: BoundingBox,
    },
    /// File a new report, optionally with a photo
    Report(ReportArgs),
    /// End the current session
    Logout,
    /// Print the URL a browser should open to sign in
    LoginUrl,
    /// Print the effective configuration and exit
    PrintConfig,
}

#[derive(Args)]
pub struct ReportArgs {
    #[arg(long)]
    category: String,
    #[arg(long)]
    description: String,
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    lng: f64,
    /// Image to attach after the request is created
    #[arg(long)]
    photo: Option<PathBuf>,
}

impl Command {
    /// Execute the command against the portal described by `config`.
    ///
    /// # Errors
    /// Configuration, transport, HTTP and validation failures.
    pub async fn run(self, config: &PortalConfig) -> Result<()> {
        if matches!(self, Self::PrintConfig) {
            return print_json(config);
        }

        let service = PortalService::from_config(config).context("failed to build portal client")?;
        tracing::debug!(base_url = %config.api_base_url, "portal client ready");

        match self {
            Self::Tenant => {
                let tenant = service.tenant_info().await?;
                let theme = service.branding().await?;
                print_json(&json!({
                    "tenant": tenant,
                    "title": theme.title,
                    "logo_url": theme.logo_url,
                    "css_variables": theme.palette.as_ref().map(css_variables),
                }))
            }
            Self::Session => print_json(&service.session().await),
            Self::Categories => print_json(&service.categories().await?),
            Self::Requests => print_json(&service.my_requests().await?),
            Self::Request { id } => print_json(&service.request(&id).await?),
            Self::Timeline { id } => print_json(&service.request_timeline(&id).await?),
            Self::Issues { bbox } => print_json(&service.public_issues(&bbox).await?),
            Self::Report(args) => report(&service, args).await,
            Self::Logout => {
                service.logout().await?;
                print_json(&json!({ "signed_out": true }))
            }
            Self::LoginUrl => {
                println!("{}", service.login_url());
                Ok(())
            }
            Self::PrintConfig => print_json(config),
        }
    }
}

async fn report(service: &PortalService, args: ReportArgs) -> Result<()> {
    let photo = match &args.photo {
        Some(path) => Some(read_photo(path).await?),
        None => None,
    };
    let payload = CreateRequestPayload {
        category_id: args.category,
        description: args.description,
        latitude: args.lat,
        longitude: args.lng,
    };

    let report = service.submit_report(&payload, photo).await?;

    let attachment = match &report.attachment {
        AttachmentOutcome::NotProvided => Value::Null,
        AttachmentOutcome::Uploaded(uploaded) => serde_json::to_value(uploaded)?,
        AttachmentOutcome::Failed(err) => {
            tracing::warn!(request_id = %report.request.id, error = %err, "photo upload failed");
            json!({ "error": err.to_string() })
        }
    };
    print_json(&json!({ "request": report.request, "attachment": attachment }))
}

async fn read_photo(path: &Path) -> Result<FilePart> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read photo {}", path.display()))?;
    let file_name = path
        .file_name()
        .map_or_else(|| "photo".to_owned(), |name| name.to_string_lossy().into_owned());
    Ok(FilePart::new(file_name, guess_mime(path), data))
}

/// Content type from the file extension; unknown extensions are sent as
/// `application/octet-stream` and left to the server to reject.
fn guess_mime(path: &Path) -> Mime {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "png" => mime::IMAGE_PNG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "svg" => mime::IMAGE_SVG,
        "webp" | "heic" => format!("image/{ext}")
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Parse `minLng,minLat,maxLng,maxLat`, the order used on the wire.
fn parse_bbox(value: &str) -> Result<BoundingBox> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid bounding box coordinate in '{value}'"))?;

    let [min_lng, min_lat, max_lng, max_lat] = parts[..] else {
        bail!("expected 4 comma-separated values, got {}", parts.len());
    };
    if min_lat > max_lat || min_lng > max_lng {
        bail!("bounding box minimum exceeds maximum");
    }
    Ok(BoundingBox::new(min_lat, min_lng, max_lat, max_lng))
}

fn css_variables(palette: &Palette) -> Map<String, Value> {
    palette
        .css_variables()
        .into_iter()
        .map(|(name, value)| (name, Value::String(value)))
        .collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
