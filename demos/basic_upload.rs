//! Basic upload example demonstrating deduplication and background scanning.
//!
//! This example shows how to:
//! - Build a DocumentService from in-memory stores and the mock engine
//! - Upload a clean document and the EICAR test file
//! - Wait for verdicts and inspect them
//! - Re-upload known bytes under a new tag and inherit the verdict
//!
//! Run with: cargo run --example basic_upload

use scangate::engine::mock::EICAR;
use scangate::prelude::*;
use std::time::Duration;

const REPORT: &[u8] = b"Quarterly figures look fine.";

async fn wait_for_verdict(
    service: &DocumentService,
    id: &DocumentId,
) -> Result<DocumentView, ServiceError> {
    loop {
        let view = service.document_view(id.as_str()).await?;
        if view.status != "pending" {
            return Ok(view);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Scangate Basic Upload Example ===\n");

    let config = ServiceConfig::new()
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_information("basic upload example")
        .with_scan_concurrency(4);

    let service = DocumentService::builder()
        .with_binary_store(InMemoryBinaryStore::new())
        .with_metadata_store(InMemoryMetadataStore::new())
        .with_engine(MockEngine::new().with_latency(Duration::from_millis(100)))
        .with_config(config)
        .build()
        .await?;

    // A clean document
    let clean = service
        .upload(UploadRequest::from_bytes(REPORT.to_vec()).with_tag("q3 report"))
        .await?;
    println!("Uploaded clean document: {:?}", clean);

    // The EICAR test file
    let eicar = service
        .upload(UploadRequest::from_bytes(EICAR.to_vec()).with_filename("eicar.com"))
        .await?;
    println!("Uploaded EICAR: {:?}", eicar);

    // Uploading the same bytes and tag again returns the same id
    let again = service
        .upload(UploadRequest::from_bytes(REPORT.to_vec()).with_tag("q3 report"))
        .await?;
    println!("Re-uploaded clean document: {:?}", again);

    println!("\n=== Verdicts ===");
    for id in [clean.id(), eicar.id()] {
        let view = wait_for_verdict(&service, id).await?;
        println!("{}", serde_json::to_string_pretty(&view)?);
    }

    // Known bytes under a new tag inherit the verdict without a new scan
    let copy = service
        .upload(UploadRequest::from_bytes(EICAR.to_vec()).with_tag("forwarded attachment"))
        .await?;
    let view = service.document_view(copy.id().as_str()).await?;
    println!("\nCopy {} was answered immediately: {}", view.id, view.status);

    println!("\n=== Health ===");
    let health = service.health().await;
    println!("{}", serde_json::to_string_pretty(&health)?);

    Ok(())
}
