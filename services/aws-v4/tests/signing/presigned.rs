// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use asyncaws_core::{RequestContext, Result};
use chrono::{TimeDelta, Utc};
use http::{Method, StatusCode};
use log::warn;

use super::{build_request, init_signing_test, load_static_credential, send_signed_request};

#[tokio::test]
async fn test_get_object_with_presigned_url() -> Result<()> {
    let Some((ctx, signer, url)) = init_signing_test() else {
        warn!("ASYNCAWS_TEST is not set, skipped");
        return Ok(());
    };

    let cred = load_static_credential();
    let req = build_request(Method::GET, &url, "not_exist_file", "");
    let request_ctx = RequestContext::new().with_expiration(Utc::now() + TimeDelta::hours(1));

    let (status, _body) = send_signed_request(&ctx, &signer, req, &cred, &request_ctx).await?;
    assert_eq!(StatusCode::NOT_FOUND, status);
    Ok(())
}
