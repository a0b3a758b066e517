//! Presents pairing payloads to the operator.

use anyhow::{Context, Result};
use qrcode::render::unicode;
use qrcode::QrCode;

use crate::common::config::PairingSettings;

const QR_IMAGE_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// Link to a rendered image of the pairing payload.
pub fn qr_link(payload: &str) -> Result<String> {
    let url = reqwest::Url::parse_with_params(
        QR_IMAGE_ENDPOINT,
        &[("size", "200x200"), ("data", payload)],
    )
    .context("Failed to build QR link")?;
    Ok(url.into())
}

/// Terminal rendering of the pairing payload.
pub fn generate_qr(payload: &str) -> Result<String> {
    let code = QrCode::new(payload.as_bytes()).context("Failed to generate QR code")?;

    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .quiet_zone(true)
        .build())
}

/// Surface a pairing payload. Never fails the session.
pub fn announce(payload: &str, settings: &PairingSettings) {
    if settings.show_link {
        match qr_link(payload) {
            Ok(link) => tracing::info!(%link, "Scan this QR to pair"),
            Err(e) => tracing::warn!(error = %e, "could not build pairing link"),
        }
    }

    if settings.show_qr {
        match generate_qr(payload) {
            Ok(qr) => println!("{qr}"),
            Err(e) => tracing::warn!(error = %e, "could not render pairing QR"),
        }
    }
}
