use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const READ_BUF_SIZE: usize = 1024 * 1024;

pub fn realtime() -> f64 {
    let now = SystemTime::now();
    let since_epoch = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    since_epoch.as_secs_f64()
}

pub fn cputime() -> f64 {
    let rusage = unsafe {
        let mut rusage = std::mem::MaybeUninit::uninit();
        libc::getrusage(libc::RUSAGE_SELF, rusage.as_mut_ptr());
        rusage.assume_init()
    };
    let user_time = rusage.ru_utime;
    let sys_time = rusage.ru_stime;
    (user_time.tv_sec as f64 + user_time.tv_usec as f64 * 1e-6)
        + (sys_time.tv_sec as f64 + sys_time.tv_usec as f64 * 1e-6)
}

/// Open a proteome file for reading, transparently decompressing gzip.
///
/// A `.gz` extension selects gzip decoding. If `path` itself is absent but a
/// `.gz` sibling exists, the sibling is opened instead, so a list naming
/// `x.faa` also finds `x.faa.gz`.
pub fn open_proteome(path: &Path) -> io::Result<Box<dyn Read>> {
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        let file = File::open(path)?;
        return Ok(Box::new(BufReader::with_capacity(
            READ_BUF_SIZE,
            GzDecoder::new(file),
        )));
    }

    match File::open(path) {
        Ok(file) => Ok(Box::new(BufReader::with_capacity(READ_BUF_SIZE, file))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let mut gz_path: PathBuf = path.to_path_buf();
            gz_path.as_mut_os_string().push(".gz");
            match File::open(&gz_path) {
                Ok(file) => Ok(Box::new(BufReader::with_capacity(
                    READ_BUF_SIZE,
                    GzDecoder::new(file),
                ))),
                Err(_) => Err(e),
            }
        }
        Err(e) => Err(e),
    }
}
