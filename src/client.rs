use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::config::ClientConfig;

pub async fn send_transcription_request(config: &ClientConfig) -> Result<Value> {
    let client = reqwest::Client::new();

    let audio_data = tokio::fs::read(&config.audio_file)
        .await
        .with_context(|| format!("Failed to read audio file: {}", config.audio_file.display()))?;

    println!(
        "📁 Audio source: file: {} ({} bytes)",
        config.audio_file.display(),
        audio_data.len()
    );

    let filename = config
        .audio_file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording.m4a".to_string());

    let form = reqwest::multipart::Form::new()
        .part("file", reqwest::multipart::Part::bytes(audio_data).file_name(filename));

    let url = config.transcribe_url();
    println!("🚀 Sending transcription request to: {url}");
    if let Some(lang) = &config.lang {
        println!("   Language: {lang}");
    }

    let response = client
        .post(url)
        .multipart(form)
        .send()
        .await
        .map_err(|e| anyhow!("Failed to send request: {}", e))?;

    let status = response.status();
    let response_text = response
        .text()
        .await
        .map_err(|e| anyhow!("Failed to read response: {}", e))?;

    if !status.is_success() {
        return Err(anyhow!(
            "Server returned error {}: {}",
            status,
            response_text
        ));
    }

    let json: Value = serde_json::from_str(&response_text)
        .map_err(|e| anyhow!("Failed to parse JSON response: {}", e))?;

    Ok(json)
}

pub async fn check_server_health(server_url: &str) -> Result<()> {
    let client = reqwest::Client::new();

    println!("🔍 Checking server health at: {server_url}/health");

    let response = client
        .get(format!("{server_url}/health"))
        .send()
        .await
        .map_err(|e| anyhow!("Failed to connect to server: {}", e))?;

    if !response.status().is_success() {
        return Err(anyhow!("Server health check failed: {}", response.status()));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| anyhow!("Failed to parse health response: {}", e))?;

    if body["ok"] == Value::Bool(true) {
        println!("✅ Server is healthy");
        Ok(())
    } else {
        Err(anyhow!("Server health check returned: {}", body))
    }
}

pub async fn run_client(config: ClientConfig) -> Result<()> {
    println!("🎵 Transcribe Relay Client");
    println!("==========================");
    println!("📁 File Mode: {}", config.audio_file.display());
    println!();

    if let Err(e) = check_server_health(&config.server_url).await {
        eprintln!("❌ {e}");
        eprintln!("💡 Make sure the relay is running: transcribe-relay serve");
        return Err(e);
    }

    match send_transcription_request(&config).await {
        Ok(result) => {
            println!("\n✅ Transcription completed!");
            println!("📝 Result:");
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Err(e) => {
            eprintln!("❌ Transcription failed: {e}");
            return Err(e);
        }
    }

    Ok(())
}
