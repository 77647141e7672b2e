use sponsr::{KinescopeVideo, SponsrError};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::common::client;

const EMBED_PAGE: &str = r#"<!DOCTYPE html>
<html><body><script>
  window.playerOptions = { playlist: [{ id: "203245765", title: "Lesson 1" }] };
</script></body></html>"#;

#[tokio::test]
async fn test_resolve_embed_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/embed/lesson-1"))
        .and(header("referer", "https://sponsr.ru/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(EMBED_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let video = KinescopeVideo::resolve(
        &client(),
        &format!("{}/embed/lesson-1", server.uri()),
        Some("https://sponsr.ru/"),
    )
    .await
    .unwrap();

    assert_eq!(video.video_id, "203245765");
    assert_eq!(video.manifest_url(), "https://kinescope.io/203245765/master.mpd");
}

#[tokio::test]
async fn test_resolve_missing_video() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = KinescopeVideo::resolve(&client(), &format!("{}/embed/gone", server.uri()), None).await;
    assert!(matches!(result, Err(SponsrError::VideoNotFound)));
}

#[tokio::test]
async fn test_resolve_forbidden_referer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html>This video is not available on this domain</html>"),
        )
        .mount(&server)
        .await;

    let result = KinescopeVideo::resolve(&client(), &format!("{}/embed/private", server.uri()), None).await;
    assert!(matches!(result, Err(SponsrError::AccessDenied)));
}

#[tokio::test]
async fn test_resolve_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = KinescopeVideo::resolve(&client(), &format!("{}/embed/x", server.uri()), None).await;
    assert!(matches!(result, Err(SponsrError::HttpError(status)) if status.as_u16() == 503));
}
