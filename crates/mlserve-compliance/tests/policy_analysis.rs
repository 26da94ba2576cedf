#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use mlserve_compliance::policy::public_statements;

#[test]
fn wildcard_principal_string() {
    let p = r#"{"Version": "2012-10-17", "Statement": [
        {"Sid": "Public", "Effect": "Allow", "Principal": "*", "Action": "s3:GetObject"}
    ]}"#;
    assert_eq!(public_statements(p).unwrap(), vec!["Public"]);
}

#[test]
fn wildcard_principal_map_and_single_statement() {
    let p = r#"{"Statement": {"Effect": "Allow", "Principal": {"AWS": "*"}}}"#;
    assert_eq!(public_statements(p).unwrap(), vec!["statement[0]"]);

    let list = r#"{"Statement": [{"Effect": "Allow", "Principal": {"AWS": ["arn:aws:iam::1:root", "*"]}}]}"#;
    assert_eq!(public_statements(list).unwrap().len(), 1);
}

#[test]
fn deny_and_scoped_principals_are_private() {
    let p = r#"{"Statement": [
        {"Effect": "Deny", "Principal": "*", "Action": "s3:*"},
        {"Effect": "Allow", "Principal": {"AWS": "arn:aws:iam::123456789012:root"}},
        {"Effect": "Allow", "Action": "s3:GetObject"}
    ]}"#;
    assert!(public_statements(p).unwrap().is_empty());
}

#[test]
fn whitespace_does_not_hide_public_access() {
    let p = "{ \"Statement\" : [ { \"Effect\" : \"Allow\" ,\n \"Principal\" : \"*\" } ] }";
    assert_eq!(public_statements(p).unwrap().len(), 1);
}

#[test]
fn unparseable_policy_is_an_error() {
    assert!(public_statements("not json").is_err());
    assert!(public_statements(r#"{"NoStatement": []}"#).is_err());
}
