//! Static zlib dictionaries used to prime header block compression.
//!
//! Both endpoints must prime their streams with the exact same bytes, so the
//! constants here are wire-format material, not tunables. The deflate stream
//! announces which dictionary it was built against via the dictionary's
//! adler32 checksum; [`id_matches`] resolves that announcement.

use std::sync::OnceLock;

use crate::protocol::SpdyVersion;

/// SPDY/2 dictionary: a bare run of common header tokens. The trailing NUL
/// is part of the dictionary.
pub const V2_DICTIONARY: &[u8] =
    b"optionsgetheadpostputdeletetraceacceptaccept-charsetaccept-encodingaccept-\
languageauthorizationexpectfromhostif-modified-sinceif-matchif-none-matchi\
f-rangeif-unmodifiedsincemax-forwardsproxy-authorizationrangerefererteuser\
-agent10010120020120220320420530030130230330430530630740040140240340440540\
6407408409410411412413414415416417500501502503504505accept-rangesageetagl\
ocationproxy-authenticatepublicretry-afterservervarywarningwww-authentica\
teallowcontent-basecontent-encodingcache-controlconnectiondatetrailertran\
sfer-encodingupgradeviawarningcontent-languagecontent-lengthcontent-locat\
ioncontent-md5content-rangecontent-typeetagexpireslast-modifiedset-cookie\
MondayTuesdayWednesdayThursdayFridaySaturdaySundayJanFebMarAprMayJunJulAu\
gSepOctNovDecchunkedtext/htmlimage/pngimage/jpgimage/gifapplication/xmlap\
plication/xhtmltext/plainpublicmax-agecharset=iso-8859-1utf-8gzipdeflateH\
TTP/1.1statusversionurl\0";

// SPDY/3 dictionary entries; each is emitted as a 4-byte big-endian length
// followed by the bytes. The last entry is a single long literal block.
const V3_DICTIONARY_ENTRIES: &[&[u8]] = &[
    b"options",
    b"head",
    b"post",
    b"put",
    b"delete",
    b"trace",
    b"accept",
    b"accept-charset",
    b"accept-encoding",
    b"accept-language",
    b"accept-ranges",
    b"age",
    b"allow",
    b"authorization",
    b"cache-control",
    b"connection",
    b"content-base",
    b"content-encoding",
    b"content-language",
    b"content-length",
    b"content-location",
    b"content-md5",
    b"content-range",
    b"content-type",
    b"date",
    b"etag",
    b"expect",
    b"expires",
    b"from",
    b"host",
    b"if-match",
    b"if-modified-since",
    b"if-none-match",
    b"if-range",
    b"if-unmodified-since",
    b"last-modified",
    b"location",
    b"max-forwards",
    b"pragma",
    b"proxy-authenticate",
    b"proxy-authorization",
    b"range",
    b"referer",
    b"retry-after",
    b"server",
    b"te",
    b"trailer",
    b"transfer-encoding",
    b"upgrade",
    b"user-agent",
    b"vary",
    b"via",
    b"warning",
    b"www-authenticate",
    b"method",
    b"get",
    b"status",
    b"200 OK",
    b"version",
    b"HTTP/1.1",
    b"url",
    b"public",
    b"set-cookie",
    b"keep-alive",
    b"origin",
    b"100101201202205206300302303304305306307402405406407408409410411412413\
414415416417502504505203 Non-Authoritative Information204 No Content301 Mov\
ed Permanently400 Bad Request401 Unauthorized403 Forbidden404 Not Found500 \
Internal Server Error501 Not Implemented503 Service UnavailableJan Feb Mar A\
pr May Jun Jul Aug Sept Oct Nov Dec 00:00:00 Mon, Tue, Wed, Thu, Fri, Sat, S\
un, GMTchunked,text/html,image/png,image/jpg,image/gif,application/xml,appl\
ication/xhtml+xml,text/plain,text/javascript,publicprivatemax-age=gzip,defl\
ate,sdchcharset=utf-8charset=iso-8859-1,utf-,*,enq=0.",
];

/// SPDY/3 dictionary: length-prefixed token list, assembled once.
pub fn v3_dictionary() -> &'static [u8] {
    static DICT: OnceLock<Vec<u8>> = OnceLock::new();
    DICT.get_or_init(|| {
        let total: usize =
            V3_DICTIONARY_ENTRIES.iter().map(|e| 4 + e.len()).sum();
        let mut dict = Vec::with_capacity(total);
        for entry in V3_DICTIONARY_ENTRIES {
            dict.extend_from_slice(&(entry.len() as u32).to_be_bytes());
            dict.extend_from_slice(entry);
        }
        dict
    })
}

/// Dictionary for a given protocol version.
pub fn dictionary_for(version: SpdyVersion) -> &'static [u8] {
    if version < SpdyVersion::V3 {
        V2_DICTIONARY
    } else {
        v3_dictionary()
    }
}

/// adler32 over `data`, as zlib computes dictionary identities.
pub fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65521;
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for chunk in data.chunks(5552) {
        for &byte in chunk {
            a += u32::from(byte);
            b += a;
        }
        a %= MOD;
        b %= MOD;
    }
    (b << 16) | a
}

fn v2_dictionary_id() -> u32 {
    static ID: OnceLock<u32> = OnceLock::new();
    *ID.get_or_init(|| adler32(V2_DICTIONARY))
}

fn v3_dictionary_id() -> u32 {
    static ID: OnceLock<u32> = OnceLock::new();
    *ID.get_or_init(|| adler32(v3_dictionary()))
}

/// Whether a deflate stream's requested dictionary id names the dictionary
/// for `version`.
pub fn id_matches(version: SpdyVersion, requested: u32) -> bool {
    if version < SpdyVersion::V3 {
        requested == v2_dictionary_id()
    } else {
        requested == v3_dictionary_id()
    }
}
