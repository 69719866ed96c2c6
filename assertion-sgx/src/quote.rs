//! Intel DCAP ECDSA quote packing and parsing.
//!
//! ## Quote Structure (little-endian)
//! ```text
//! [48]  header
//!   u16 version
//!   u16 attestation_key_type
//!   u32 reserved
//!   u16 qe_svn
//!   u16 pce_svn
//!   [16] qe_vendor_id
//!   [20] user_data
//! [384] report body (attested enclave)
//! u32   signature_data_length
//! signature data (signature_data_length bytes):
//!   [64]  ISV report signature
//!   [64]  attestation public key
//!   [384] QE report body
//!   [64]  QE report signature
//!   u16   qe_authn_data size, followed by qe_authn_data
//!   u16   qe_cert_data type
//!   u32   qe_cert_data size, followed by qe_cert_data
//! ```
//!
//! Parsing never slices by `signature_data_length`. The variable fields are
//! read from their own prefixes, and the declared length is then compared
//! with what was actually present.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error("Buffer too small for {field}: need {expected} bytes, {actual} remaining")]
    BufferTooSmall {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Expected signature data size of {expected} bytes, found {actual}")]
    SignatureDataSize { expected: usize, actual: usize },

    #[error("{field} is {len} bytes, larger than its length prefix allows ({max})")]
    FieldTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Unsupported quote version: {0}")]
    UnsupportedVersion(u16),

    #[error("Unsupported attestation key type: {0}")]
    UnsupportedKeyType(u16),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Quote rejected: {0}")]
    Rejected(&'static str),
}

/// Quote format version handled by the DCAP authority.
pub const QUOTE_VERSION_3: u16 = 3;

/// Attestation key type for ECDSA-256 with P-256.
pub const ATTESTATION_KEY_TYPE_ECDSA_P256: u16 = 2;

/// PCK certificate chain (PEM), the usual `qe_cert_data_type`.
pub const CERT_DATA_TYPE_PCK_CERT_CHAIN: u16 = 5;

pub const HEADER_SIZE: usize = 48;
pub const REPORT_BODY_SIZE: usize = 384;
/// Report body plus the u32 signature data length.
pub const BODY_RECORD_SIZE: usize = REPORT_BODY_SIZE + 4;
pub const SIGNATURE_SIZE: usize = 64 + 64 + REPORT_BODY_SIZE + 64;
/// Smallest buffer that can hold the fixed records.
pub const MIN_QUOTE_SIZE: usize = HEADER_SIZE + BODY_RECORD_SIZE + SIGNATURE_SIZE;

const AUTHN_SIZE_PREFIX: usize = 2;
const CERT_PREFIX: usize = 2 + 4;

/// Bounds-checked cursor over untrusted quote bytes.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], QuoteError> {
        if len > self.buf.len() {
            return Err(QuoteError::BufferTooSmall {
                field,
                expected: len,
                actual: self.buf.len(),
            });
        }
        let (head, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], QuoteError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, QuoteError> {
        self.array(field).map(u16::from_le_bytes)
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, QuoteError> {
        self.array(field).map(u32::from_le_bytes)
    }

    fn u64(&mut self, field: &'static str) -> Result<u64, QuoteError> {
        self.array(field).map(u64::from_le_bytes)
    }
}

/// Quote header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteHeader {
    pub version: u16,
    pub attestation_key_type: u16,
    pub reserved: u32,
    pub qe_svn: u16,
    pub pce_svn: u16,
    pub qe_vendor_id: [u8; 16],
    pub user_data: [u8; 20],
}

impl QuoteHeader {
    /// Decode from the first [`HEADER_SIZE`] bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, QuoteError> {
        Self::read(&mut Reader::new(bytes))
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, QuoteError> {
        Ok(Self {
            version: r.u16("header.version")?,
            attestation_key_type: r.u16("header.attestation_key_type")?,
            reserved: r.u32("header.reserved")?,
            qe_svn: r.u16("header.qe_svn")?,
            pce_svn: r.u16("header.pce_svn")?,
            qe_vendor_id: r.array("header.qe_vendor_id")?,
            user_data: r.array("header.user_data")?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.attestation_key_type.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());
        out.extend_from_slice(&self.qe_svn.to_le_bytes());
        out.extend_from_slice(&self.pce_svn.to_le_bytes());
        out.extend_from_slice(&self.qe_vendor_id);
        out.extend_from_slice(&self.user_data);
    }
}

/// SGX enclave attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attributes {
    pub flags: u64,
    pub xfrm: u64,
}

impl Attributes {
    pub const FLAG_DEBUG: u64 = 0x02;

    pub fn is_debug(&self) -> bool {
        self.flags & Self::FLAG_DEBUG != 0
    }
}

/// SGX report body, used both for the attested enclave and the QE report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportBody {
    pub cpu_svn: [u8; 16],
    pub misc_select: u32,
    pub reserved1: [u8; 28],
    pub attributes: Attributes,
    pub mr_enclave: [u8; 32],
    pub reserved2: [u8; 32],
    pub mr_signer: [u8; 32],
    pub reserved3: [u8; 96],
    pub isv_prod_id: u16,
    pub isv_svn: u16,
    pub reserved4: [u8; 60],
    pub report_data: [u8; 64],
}

impl ReportBody {
    /// Decode from the first [`REPORT_BODY_SIZE`] bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, QuoteError> {
        Self::read(&mut Reader::new(bytes))
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, QuoteError> {
        Ok(Self {
            cpu_svn: r.array("report.cpu_svn")?,
            misc_select: r.u32("report.misc_select")?,
            reserved1: r.array("report.reserved1")?,
            attributes: Attributes {
                flags: r.u64("report.attributes.flags")?,
                xfrm: r.u64("report.attributes.xfrm")?,
            },
            mr_enclave: r.array("report.mr_enclave")?,
            reserved2: r.array("report.reserved2")?,
            mr_signer: r.array("report.mr_signer")?,
            reserved3: r.array("report.reserved3")?,
            isv_prod_id: r.u16("report.isv_prod_id")?,
            isv_svn: r.u16("report.isv_svn")?,
            reserved4: r.array("report.reserved4")?,
            report_data: r.array("report.report_data")?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.cpu_svn);
        out.extend_from_slice(&self.misc_select.to_le_bytes());
        out.extend_from_slice(&self.reserved1);
        out.extend_from_slice(&self.attributes.flags.to_le_bytes());
        out.extend_from_slice(&self.attributes.xfrm.to_le_bytes());
        out.extend_from_slice(&self.mr_enclave);
        out.extend_from_slice(&self.reserved2);
        out.extend_from_slice(&self.mr_signer);
        out.extend_from_slice(&self.reserved3);
        out.extend_from_slice(&self.isv_prod_id.to_le_bytes());
        out.extend_from_slice(&self.isv_svn.to_le_bytes());
        out.extend_from_slice(&self.reserved4);
        out.extend_from_slice(&self.report_data);
    }
}

/// Fixed part of the ECDSA signature data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteSignature {
    /// ECDSA signature over header and report body (r || s)
    pub isv_report_signature: [u8; 64],
    /// Attestation public key (x || y)
    pub attestation_key: [u8; 64],
    pub qe_report: ReportBody,
    /// PCK signature over the QE report
    pub qe_report_signature: [u8; 64],
}

impl QuoteSignature {
    /// Decode from the first [`SIGNATURE_SIZE`] bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, QuoteError> {
        Self::read(&mut Reader::new(bytes))
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, QuoteError> {
        Ok(Self {
            isv_report_signature: r.array("signature.isv_report_signature")?,
            attestation_key: r.array("signature.attestation_key")?,
            qe_report: ReportBody::read(r)?,
            qe_report_signature: r.array("signature.qe_report_signature")?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.isv_report_signature);
        out.extend_from_slice(&self.attestation_key);
        self.qe_report.write(out);
        out.extend_from_slice(&self.qe_report_signature);
    }
}

/// QE certification data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertData {
    pub qe_cert_data_type: u16,
    pub qe_cert_data: Vec<u8>,
}

/// An Intel DCAP quote generated by the quoting enclave.
///
/// `signature_data_length` is not stored: [`pack`] computes it and [`parse`]
/// checks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntelQeQuote {
    pub header: QuoteHeader,
    pub body: ReportBody,
    pub signature: QuoteSignature,
    /// Optional, may be empty
    pub qe_authn_data: Vec<u8>,
    pub cert_data: CertData,
}

impl IntelQeQuote {
    /// Size of the signature data region as written by [`pack`].
    pub fn signature_data_len(&self) -> usize {
        SIGNATURE_SIZE
            + AUTHN_SIZE_PREFIX
            + self.qe_authn_data.len()
            + CERT_PREFIX
            + self.cert_data.qe_cert_data.len()
    }

    /// Bytes covered by the ISV report signature: header followed by the
    /// report body.
    pub fn signed_data(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + REPORT_BODY_SIZE);
        self.header.write(&mut out);
        self.body.write(&mut out);
        out
    }
}

/// Serialize `quote` into the DCAP wire format.
///
/// Fails only if a variable-length field does not fit its length prefix.
pub fn pack(quote: &IntelQeQuote) -> Result<Vec<u8>, QuoteError> {
    let authn_len = u16::try_from(quote.qe_authn_data.len()).map_err(|_| QuoteError::FieldTooLarge {
        field: "qe_authn_data",
        len: quote.qe_authn_data.len(),
        max: u16::MAX as usize,
    })?;
    let cert_len = u32::try_from(quote.cert_data.qe_cert_data.len()).map_err(|_| QuoteError::FieldTooLarge {
        field: "qe_cert_data",
        len: quote.cert_data.qe_cert_data.len(),
        max: u32::MAX as usize,
    })?;
    let signature_data_len = quote.signature_data_len();
    let declared = u32::try_from(signature_data_len).map_err(|_| QuoteError::FieldTooLarge {
        field: "signature data",
        len: signature_data_len,
        max: u32::MAX as usize,
    })?;

    let mut out = Vec::with_capacity(HEADER_SIZE + BODY_RECORD_SIZE + signature_data_len);
    quote.header.write(&mut out);
    quote.body.write(&mut out);
    out.extend_from_slice(&declared.to_le_bytes());

    quote.signature.write(&mut out);
    out.extend_from_slice(&authn_len.to_le_bytes());
    out.extend_from_slice(&quote.qe_authn_data);
    out.extend_from_slice(&quote.cert_data.qe_cert_data_type.to_le_bytes());
    out.extend_from_slice(&cert_len.to_le_bytes());
    out.extend_from_slice(&quote.cert_data.qe_cert_data);

    Ok(out)
}

/// Parse a packed DCAP quote.
pub fn parse(bytes: &[u8]) -> Result<IntelQeQuote, QuoteError> {
    if bytes.len() < MIN_QUOTE_SIZE {
        return Err(QuoteError::BufferTooSmall {
            field: "quote",
            expected: MIN_QUOTE_SIZE,
            actual: bytes.len(),
        });
    }

    let mut r = Reader::new(bytes);
    let header = QuoteHeader::read(&mut r)?;
    let body = ReportBody::read(&mut r)?;
    let declared = r.u32("signature_data_length")? as usize;

    let region = r.remaining();
    let signature = QuoteSignature::read(&mut r)?;

    let authn_len = r.u16("qe_authn_data size")? as usize;
    let qe_authn_data = r.take("qe_authn_data", authn_len)?.to_vec();

    let qe_cert_data_type = r.u16("qe_cert_data type")?;
    let cert_len = r.u32("qe_cert_data size")? as usize;
    let qe_cert_data = r.take("qe_cert_data", cert_len)?.to_vec();

    let consumed = region - r.remaining();
    if consumed != declared || r.remaining() != 0 {
        return Err(QuoteError::SignatureDataSize {
            expected: declared,
            actual: region,
        });
    }

    Ok(IntelQeQuote {
        header,
        body,
        signature,
        qe_authn_data,
        cert_data: CertData {
            qe_cert_data_type,
            qe_cert_data,
        },
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assertion_core::{AssertionError, ErrorKind};
    use proptest::prelude::*;
    use rand::Rng;

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        rand::thread_rng().fill(&mut bytes[..]);
        bytes
    }

    pub(crate) fn random_quote(authn_len: usize, cert_len: usize) -> IntelQeQuote {
        IntelQeQuote {
            header: QuoteHeader::from_slice(&random_bytes(HEADER_SIZE)).unwrap(),
            body: ReportBody::from_slice(&random_bytes(REPORT_BODY_SIZE)).unwrap(),
            signature: QuoteSignature::from_slice(&random_bytes(SIGNATURE_SIZE)).unwrap(),
            qe_authn_data: random_bytes(authn_len),
            cert_data: CertData {
                qe_cert_data_type: rand::thread_rng().gen(),
                qe_cert_data: random_bytes(cert_len),
            },
        }
    }

    fn random_valid_quote() -> IntelQeQuote {
        random_quote(123, 456)
    }

    fn assert_invalid_argument(err: QuoteError) {
        assert_eq!(AssertionError::from(err).kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_parse_success() {
        let expected = random_valid_quote();
        let parsed = parse(&pack(&expected).unwrap()).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_without_optional_authn_data() {
        let mut expected = random_valid_quote();
        expected.qe_authn_data.clear();

        let parsed = parse(&pack(&expected).unwrap()).unwrap();
        assert_eq!(parsed, expected);
        assert!(parsed.qe_authn_data.is_empty());
    }

    #[test]
    fn test_parse_fails_buffer_too_large() {
        let mut packed = pack(&random_valid_quote()).unwrap();
        packed.push(b'x');

        let err = parse(&packed).unwrap_err();
        assert!(err.to_string().contains("Expected signature data size of "));
        assert_invalid_argument(err);
    }

    #[test]
    fn test_parse_fails_buffer_too_small() {
        let mut packed = pack(&random_valid_quote()).unwrap();
        while packed.pop().is_some() {
            let err = parse(&packed).unwrap_err();
            assert_invalid_argument(err);
        }
    }

    #[test]
    fn test_parse_invalid_quote_too_short() {
        let result = parse(&[0u8; 10]);
        assert!(matches!(
            result,
            Err(QuoteError::BufferTooSmall { expected: MIN_QUOTE_SIZE, actual: 10, .. })
        ));
    }

    #[test]
    fn test_round_trip_pack_parse_pack() {
        let packed = pack(&random_valid_quote()).unwrap();
        let parsed = parse(&packed).unwrap();
        assert_eq!(pack(&parsed).unwrap(), packed);
    }

    #[test]
    fn test_declared_length_mismatch_rejected() {
        let mut packed = pack(&random_valid_quote()).unwrap();
        let offset = HEADER_SIZE + REPORT_BODY_SIZE;
        let declared = u32::from_le_bytes(packed[offset..offset + 4].try_into().unwrap());
        packed[offset..offset + 4].copy_from_slice(&(declared - 1).to_le_bytes());

        let err = parse(&packed).unwrap_err();
        assert_eq!(
            err,
            QuoteError::SignatureDataSize {
                expected: declared as usize - 1,
                actual: declared as usize,
            }
        );
    }

    #[test]
    fn test_inflated_authn_size_rejected() {
        let mut packed = pack(&random_valid_quote()).unwrap();
        let offset = HEADER_SIZE + BODY_RECORD_SIZE + SIGNATURE_SIZE;
        packed[offset..offset + 2].copy_from_slice(&u16::MAX.to_le_bytes());

        assert!(matches!(
            parse(&packed),
            Err(QuoteError::BufferTooSmall { field: "qe_authn_data", .. })
        ));
    }

    #[test]
    fn test_wire_layout() {
        let quote = random_valid_quote();
        let packed = pack(&quote).unwrap();

        assert_eq!(packed.len(), HEADER_SIZE + BODY_RECORD_SIZE + quote.signature_data_len());
        assert_eq!(&packed[0..2], &quote.header.version.to_le_bytes());
        assert_eq!(&packed[28..48], &quote.header.user_data);

        let body = HEADER_SIZE;
        assert_eq!(&packed[body + 48..body + 56], &quote.body.attributes.flags.to_le_bytes());
        assert_eq!(&packed[body + 64..body + 96], &quote.body.mr_enclave);
        assert_eq!(&packed[body + 128..body + 160], &quote.body.mr_signer);
        assert_eq!(&packed[body + 256..body + 258], &quote.body.isv_prod_id.to_le_bytes());
        assert_eq!(&packed[body + 320..body + 384], &quote.body.report_data);

        let declared = &packed[body + REPORT_BODY_SIZE..body + BODY_RECORD_SIZE];
        assert_eq!(declared, &(quote.signature_data_len() as u32).to_le_bytes());

        let authn = HEADER_SIZE + BODY_RECORD_SIZE + SIGNATURE_SIZE;
        assert_eq!(&packed[authn..authn + 2], &123u16.to_le_bytes());
        let cert = authn + 2 + 123;
        assert_eq!(&packed[cert..cert + 2], &quote.cert_data.qe_cert_data_type.to_le_bytes());
        assert_eq!(&packed[cert + 2..cert + 6], &456u32.to_le_bytes());
        assert_eq!(&packed[cert + 6..], quote.cert_data.qe_cert_data.as_slice());
    }

    #[test]
    fn test_oversized_authn_data_not_packable() {
        let quote = random_quote(u16::MAX as usize + 1, 0);
        assert!(matches!(
            pack(&quote),
            Err(QuoteError::FieldTooLarge { field: "qe_authn_data", .. })
        ));
    }

    #[test]
    fn test_signed_data_is_header_and_body() {
        let quote = random_valid_quote();
        let packed = pack(&quote).unwrap();
        assert_eq!(quote.signed_data(), &packed[..HEADER_SIZE + REPORT_BODY_SIZE]);
    }

    proptest! {
        #[test]
        fn prop_round_trip(authn_len in 0usize..1024, cert_len in 0usize..2048) {
            let quote = random_quote(authn_len, cert_len);
            prop_assert_eq!(parse(&pack(&quote).unwrap()).unwrap(), quote);
        }

        #[test]
        fn prop_truncation_rejected(authn_len in 0usize..256, cert_len in 0usize..256, cut in 1usize..2048) {
            let packed = pack(&random_quote(authn_len, cert_len)).unwrap();
            let keep = packed.len().saturating_sub(cut);
            prop_assert!(parse(&packed[..keep]).is_err());
        }

        #[test]
        fn prop_appended_bytes_rejected(extra in proptest::collection::vec(any::<u8>(), 1..64)) {
            let mut packed = pack(&random_valid_quote()).unwrap();
            packed.extend_from_slice(&extra);
            let is_size_error = matches!(parse(&packed), Err(QuoteError::SignatureDataSize { .. }));
            prop_assert!(is_size_error);
        }
    }
}
