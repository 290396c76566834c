use vhostd::http::request::{Method, RequestBuilder, Version};

#[test]
fn test_request_header_retrieval() {
    let req = RequestBuilder::new()
        .uri("http://example.com/")
        .header("Host", "example.com")
        .header("Content-Type", "application/json")
        .build()
        .unwrap();

    assert_eq!(req.header("host"), Some("example.com"));
    assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_content_length_parsing() {
    let req = RequestBuilder::new()
        .method(Method::POST)
        .uri("http://example.com/api")
        .header("Content-Length", " 42 ")
        .build()
        .unwrap();

    assert_eq!(req.content_length(), Some(42));
}

#[test]
fn test_request_invalid_content_length() {
    let req = RequestBuilder::new()
        .uri("http://example.com/")
        .header("Content-Length", "abc")
        .build()
        .unwrap();

    assert_eq!(req.content_length(), None);
}

#[test]
fn test_host_prefers_header_over_uri() {
    let with_header = RequestBuilder::new()
        .uri("http://origin.test/")
        .header("Host", "vhost.test:8080")
        .build()
        .unwrap();
    let without_header = RequestBuilder::new().uri("http://origin.test/").build().unwrap();

    assert_eq!(with_header.host(), Some("vhost.test:8080"));
    assert_eq!(without_header.host(), Some("origin.test"));
}

#[test]
fn test_accept_encoding_lists() {
    let req = RequestBuilder::new()
        .uri("http://example.com/")
        .header("Accept-Encoding", "br;q=1.0, GZIP;q=0.8")
        .build()
        .unwrap();

    assert!(req.accepts_encoding("gzip"));
    assert!(!req.accepts_encoding("deflate"));
}

#[test]
fn test_builder_requires_absolute_uri() {
    assert!(RequestBuilder::new().uri("/relative").build().is_err());
    assert!(RequestBuilder::new().build().is_err());
}

#[test]
fn test_method_and_version_names() {
    assert_eq!(Method::parse("MKCOL"), Method::MKCOL);
    assert_eq!(Method::parse("Get"), Method::Unknown);
    assert_eq!(Method::DELETE.to_string(), "DELETE");
    assert!(Method::HEAD.is_read_only());
    assert!(!Method::POST.is_read_only());

    assert_eq!(Version::parse("HTTP/1.0"), Some(Version::V1_0));
    assert_eq!(Version::parse("HTTP/0.9"), Some(Version::V0_9));
    assert_eq!(Version::parse("HTTP/3"), None);
    assert_eq!(Version::default(), Version::V1_1);
}
