use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use bincode::Options;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BrepError, FormatError, Result};

const MAGIC: &[u8; 4] = b"BREP";
const VERSION: u32 = 1;
const DIGEST_LEN: usize = 32;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

fn corrupt(message: impl Into<String>) -> BrepError {
    FormatError::CorruptData(message.into()).into()
}

fn read_failure(error: std::io::Error) -> BrepError {
    if error.kind() == ErrorKind::UnexpectedEof {
        corrupt("truncated record")
    } else {
        FormatError::Stream(error).into()
    }
}

/// Writes one framed record: magic, version, tag, payload length, blake3
/// digest of the payload, then the bincode payload.
pub(crate) fn write_record<W, T>(writer: &mut W, tag: &str, value: &T) -> Result<()>
where
    W: Write,
    T: Serialize + ?Sized,
{
    let tag_len = u8::try_from(tag.len())
        .map_err(|_| FormatError::UnsupportedFormat(format!("record tag too long: {tag}")))?;
    let payload = options()
        .serialize(value)
        .map_err(|e| corrupt(format!("cannot encode {tag}: {e}")))?;
    let digest = blake3::hash(&payload);

    writer.write_all(MAGIC).map_err(FormatError::Stream)?;
    writer
        .write_u32::<LittleEndian>(VERSION)
        .map_err(FormatError::Stream)?;
    writer.write_u8(tag_len).map_err(FormatError::Stream)?;
    writer.write_all(tag.as_bytes()).map_err(FormatError::Stream)?;
    writer
        .write_u64::<LittleEndian>(payload.len() as u64)
        .map_err(FormatError::Stream)?;
    writer
        .write_all(digest.as_bytes())
        .map_err(FormatError::Stream)?;
    writer.write_all(&payload).map_err(FormatError::Stream)?;
    Ok(())
}

/// Reads one framed record written by [`write_record`] with the same tag.
/// Nothing past the record is consumed.
pub(crate) fn read_record<R, T>(reader: &mut R, tag: &str) -> Result<T>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut magic = [0_u8; 4];
    reader.read_exact(&mut magic).map_err(read_failure)?;
    if &magic != MAGIC {
        return Err(corrupt("bad magic number"));
    }
    let version = reader
        .read_u32::<LittleEndian>()
        .map_err(read_failure)?;
    if version != VERSION {
        return Err(corrupt(format!("unsupported record version {version}")));
    }
    let tag_len = reader.read_u8().map_err(read_failure)?;
    let mut stored_tag = vec![0_u8; usize::from(tag_len)];
    reader.read_exact(&mut stored_tag).map_err(read_failure)?;
    if stored_tag != tag.as_bytes() {
        return Err(corrupt(format!(
            "expected a {tag} record, found {}",
            String::from_utf8_lossy(&stored_tag)
        )));
    }
    let payload_len = reader
        .read_u64::<LittleEndian>()
        .map_err(read_failure)?;
    let mut digest = [0_u8; DIGEST_LEN];
    reader.read_exact(&mut digest).map_err(read_failure)?;

    let mut payload = Vec::new();
    reader
        .by_ref()
        .take(payload_len)
        .read_to_end(&mut payload)
        .map_err(read_failure)?;
    if payload.len() as u64 != payload_len {
        return Err(corrupt("truncated record"));
    }
    if blake3::hash(&payload) != blake3::Hash::from_bytes(digest) {
        return Err(corrupt(format!("{tag} record checksum mismatch")));
    }
    options()
        .deserialize(&payload)
        .map_err(|e| corrupt(format!("cannot decode {tag}: {e}")))
}

fn with_path(error: BrepError, path: &Path) -> BrepError {
    match error {
        BrepError::Format(FormatError::Stream(source)) => FormatError::io(path, source).into(),
        other => other,
    }
}

/// Creates `path` and hands a buffered writer to `write`.
pub(crate) fn save_with<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let file = File::create(path).map_err(|e| FormatError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer).map_err(|e| with_path(e, path))?;
    writer.flush().map_err(|e| FormatError::io(path, e))?;
    Ok(())
}

/// Opens `path`, hands a buffered reader to `read` and fails if any byte is
/// left once it returns.
pub(crate) fn load_with<T, F>(path: &Path, read: F) -> Result<T>
where
    F: FnOnce(&mut BufReader<File>) -> Result<T>,
{
    let file = File::open(path).map_err(|e| FormatError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let value = read(&mut reader).map_err(|e| with_path(e, path))?;
    let mut rest = [0_u8; 1];
    match reader.read(&mut rest) {
        Ok(0) => Ok(value),
        Ok(_) => Err(corrupt(format!("trailing bytes in {}", path.display()))),
        Err(e) => Err(FormatError::io(path, e).into()),
    }
}

/// Writes a file holding exactly one record.
pub(crate) fn save_record<T: Serialize + ?Sized>(path: &Path, tag: &str, value: &T) -> Result<()> {
    save_with(path, |writer| write_record(writer, tag, value))
}

/// Reads a file holding exactly one record.
pub(crate) fn load_record<T: DeserializeOwned>(path: &Path, tag: &str) -> Result<T> {
    load_with(path, |reader| read_record(reader, tag))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        values: Vec<Option<usize>>,
    }

    fn sample() -> Sample {
        Sample {
            name: "sample".into(),
            values: vec![Some(1), None, Some(3)],
        }
    }

    fn is_corrupt<T: std::fmt::Debug>(result: Result<T>) -> bool {
        matches!(result, Err(BrepError::Format(FormatError::CorruptData(_))))
    }

    #[test]
    fn record_round_trip() {
        let mut bytes = Vec::new();
        write_record(&mut bytes, "sample", &sample()).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        let decoded: Sample = read_record(&mut bytes.as_slice(), "sample").unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn every_truncation_is_corrupt() {
        let mut bytes = Vec::new();
        write_record(&mut bytes, "sample", &sample()).unwrap();
        for len in 0..bytes.len() {
            let result: Result<Sample> = read_record(&mut &bytes[..len], "sample");
            assert!(is_corrupt(result), "length {len}");
        }
    }

    #[test]
    fn flipped_payload_byte_fails_the_digest() {
        let mut bytes = Vec::new();
        write_record(&mut bytes, "sample", &sample()).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let result: Result<Sample> = read_record(&mut bytes.as_slice(), "sample");
        assert!(is_corrupt(result));
    }

    #[test]
    fn tag_mismatch_is_corrupt() {
        let mut bytes = Vec::new();
        write_record(&mut bytes, "sample", &sample()).unwrap();
        let result: Result<Sample> = read_record(&mut bytes.as_slice(), "other");
        assert!(is_corrupt(result));
    }

    #[test]
    fn file_with_trailing_bytes_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.bin");
        save_record(&path, "sample", &sample()).unwrap();
        let decoded: Sample = load_record(&path, "sample").unwrap();
        assert_eq!(decoded, sample());

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0]).unwrap();
        assert!(is_corrupt(load_record::<Sample>(&path, "sample")));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.bin");
        let err = load_record::<Sample>(&path, "sample").unwrap_err();
        assert!(matches!(err, BrepError::Format(FormatError::Io { .. })));
        assert!(err.to_string().contains("absent.bin"));
    }
}
