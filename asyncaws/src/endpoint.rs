/// Where and how to send a request for one service in one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointMetadata {
    /// Base URL, without a trailing `/`.
    pub endpoint: String,
    /// Region in the credential scope.
    pub sign_region: String,
    /// Service in the credential scope.
    pub sign_service: String,
    /// Supported signature versions, preferred first.
    pub sign_versions: Vec<String>,
}

impl EndpointMetadata {
    /// Create metadata from its parts.
    pub fn new(
        endpoint: impl Into<String>,
        sign_region: impl Into<String>,
        sign_service: impl Into<String>,
        sign_versions: Vec<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            sign_region: sign_region.into(),
            sign_service: sign_service.into(),
            sign_versions,
        }
    }

    /// Resolve the regional endpoint of `service` using the partition rules.
    ///
    /// ```
    /// use asyncaws::EndpointMetadata;
    ///
    /// let meta = EndpointMetadata::for_region("sqs", "fips-us-east-1", vec!["v4".into()]);
    /// assert_eq!(meta.endpoint, "https://sqs-fips.us-east-1.amazonaws.com");
    /// assert_eq!(meta.sign_region, "us-east-1");
    /// ```
    pub fn for_region(service: &str, region: &str, sign_versions: Vec<String>) -> Self {
        let (region, fips) = match (region.strip_prefix("fips-"), region.strip_suffix("-fips")) {
            (Some(r), _) | (None, Some(r)) => (r, true),
            (None, None) => (region, false),
        };

        let host = format!(
            "{service}{}.{region}.{}",
            if fips { "-fips" } else { "" },
            dns_suffix(region)
        );
        Self::new(format!("https://{host}"), region, service, sign_versions)
    }
}

/// DNS suffix of the partition `region` belongs to.
pub fn dns_suffix(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else if region.starts_with("us-isob-") {
        "sc2s.sgov.gov"
    } else if region.starts_with("us-iso-") {
        "c2s.ic.gov"
    } else {
        "amazonaws.com"
    }
}
