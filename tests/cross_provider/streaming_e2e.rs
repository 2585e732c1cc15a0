use futures_util::StreamExt;
use platformed_gateway::{CompletionOptions, Error};
use wiremock::MockServer;

use super::providers::{
    anthropic::AnthropicTestSetup, google::GoogleTestSetup, openai::OpenAITestSetup,
    ProviderTestSetup,
};

const FRAGMENTS: &[&str] = &["Hello", " world", ", from", " the stream"];

/// Fragments arrive one by one, in order, and reassemble into the full text.
async fn run_streaming_test<T: ProviderTestSetup>() {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    T::mount_streaming_mocks(&mock_server, FRAGMENTS).await;

    let provider = T::create_provider(&mock_server.uri());
    assert_eq!(provider.id(), config.id);
    assert!(!provider.is_local());
    assert!(provider.probe().await, "{}: a keyed provider probes true", config.name);

    let completion = provider
        .complete("Say hello", &CompletionOptions::default())
        .await
        .unwrap_or_else(|e| panic!("{}: request failed: {e}", config.name));

    let fragments: Vec<String> = completion
        .into_stream()
        .map(|fragment| fragment.expect("Stream should parse correctly"))
        .collect()
        .await;

    assert_eq!(fragments, FRAGMENTS, "{}: fragments out of order", config.name);
    assert_eq!(fragments.concat(), "Hello world, from the stream");
}

async fn run_error_test<T: ProviderTestSetup>(
    (status, body): (u16, serde_json::Value),
    expected: String,
) {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    T::mount_error_mock(&mock_server, status, body).await;

    let provider = T::create_provider(&mock_server.uri());
    let error = provider
        .complete("Say hello", &CompletionOptions::default())
        .await
        .expect_err("an error status must fail the request");

    assert_eq!(error.to_string(), expected, "{}", config.name);
}

async fn run_auth_test<T: ProviderTestSetup>() {
    let vendor = T::get_config().vendor;
    run_error_test::<T>(
        T::auth_error(),
        format!("Invalid {vendor} API key. Check your settings."),
    )
    .await;
}

async fn run_rate_limit_test<T: ProviderTestSetup>() {
    let vendor = T::get_config().vendor;
    run_error_test::<T>(
        T::rate_limit_error(),
        format!("{vendor} rate limit exceeded. Try again later."),
    )
    .await;
}

async fn run_server_error_test<T: ProviderTestSetup>() {
    let config = T::get_config();
    let mock_server = MockServer::start().await;
    T::mount_error_mock(&mock_server, 500, serde_json::json!({})).await;

    let provider = T::create_provider(&mock_server.uri());
    let error = provider
        .complete("Say hello", &CompletionOptions::default())
        .await
        .expect_err("a 500 must fail the request");

    assert!(
        matches!(error, Error::Provider { .. }),
        "{}: unexpected error {error:?}",
        config.name
    );
}

/// Nothing listens on port 1, so the request fails before any response.
async fn run_unreachable_test<T: ProviderTestSetup>() {
    let config = T::get_config();
    let provider = T::create_provider("http://127.0.0.1:1");

    let error = provider
        .complete("Say hello", &CompletionOptions::default())
        .await
        .expect_err("a refused connection must fail the request");

    assert!(
        matches!(&error, Error::Unreachable { vendor } if vendor == config.vendor),
        "{}: unexpected error {error:?}",
        config.name
    );
    assert_eq!(
        error.to_string(),
        format!("Could not reach {}. Check your network connection.", config.vendor)
    );
}

#[tokio::test]
async fn test_openai_streaming() {
    run_streaming_test::<OpenAITestSetup>().await;
}

#[tokio::test]
async fn test_anthropic_streaming() {
    run_streaming_test::<AnthropicTestSetup>().await;
}

#[tokio::test]
async fn test_google_streaming() {
    run_streaming_test::<GoogleTestSetup>().await;
}

#[tokio::test]
async fn test_openai_auth_error() {
    run_auth_test::<OpenAITestSetup>().await;
}

#[tokio::test]
async fn test_anthropic_auth_error() {
    run_auth_test::<AnthropicTestSetup>().await;
}

#[tokio::test]
async fn test_google_auth_error() {
    run_auth_test::<GoogleTestSetup>().await;
}

#[tokio::test]
async fn test_openai_rate_limit() {
    run_rate_limit_test::<OpenAITestSetup>().await;
}

#[tokio::test]
async fn test_anthropic_rate_limit() {
    run_rate_limit_test::<AnthropicTestSetup>().await;
}

#[tokio::test]
async fn test_google_rate_limit() {
    run_rate_limit_test::<GoogleTestSetup>().await;
}

#[tokio::test]
async fn test_server_errors_are_provider_errors() {
    run_server_error_test::<OpenAITestSetup>().await;
    run_server_error_test::<AnthropicTestSetup>().await;
    run_server_error_test::<GoogleTestSetup>().await;
}

#[tokio::test]
async fn test_unreachable_vendor_is_normalized() {
    run_unreachable_test::<OpenAITestSetup>().await;
    run_unreachable_test::<AnthropicTestSetup>().await;
    run_unreachable_test::<GoogleTestSetup>().await;
}
