//! Wire framing for the plugin boundary.
//!
//! Plugins speak the standard protoc plugin protocol: one binary
//! `CodeGeneratorRequest` on stdin, one binary `CodeGeneratorResponse` on
//! stdout. The payloads are passed through untouched: decoding here only
//! checks well-formedness and feeds log fields. The decoded messages are
//! never re-encoded, since fields newer than these types would be lost.

use prost::Message;

pub use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};

pub fn decode_request(bytes: &[u8]) -> Result<CodeGeneratorRequest, prost::DecodeError> {
    CodeGeneratorRequest::decode(bytes)
}

pub fn decode_response(bytes: &[u8]) -> Result<CodeGeneratorResponse, prost::DecodeError> {
    CodeGeneratorResponse::decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_output_is_an_empty_response() {
        let response = decode_response(&[]).unwrap();
        assert_eq!(response, CodeGeneratorResponse::default());
    }

    #[test]
    fn test_truncated_output_is_rejected() {
        assert!(decode_response(&[0xff]).is_err());
    }

    #[test]
    fn test_unknown_fields_are_tolerated() {
        // supported_features = 3, then fields 3 and 4 (edition bounds).
        let bytes = [0x10, 0x03, 0x18, 0xe6, 0x07, 0x20, 0xe9, 0x07];
        let response = decode_response(&bytes).unwrap();
        assert_eq!(response.supported_features, Some(3));

        // parameter = "p", then field 17 as an empty message.
        let bytes = [0x12, 0x01, 0x70, 0x8a, 0x01, 0x00];
        let request = decode_request(&bytes).unwrap();
        assert_eq!(request.parameter.as_deref(), Some("p"));
    }

    #[test]
    fn test_response_with_files() {
        let response = CodeGeneratorResponse {
            file: vec![prost_types::compiler::code_generator_response::File {
                name: Some("foo.pb.go".into()),
                content: Some("package foo".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let decoded = decode_response(&response.encode_to_vec()).unwrap();
        assert_eq!(decoded.file[0].name.as_deref(), Some("foo.pb.go"));
    }
}
