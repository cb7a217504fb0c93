use std::fs::File;
use std::io::{self, BufReader, ErrorKind};
use std::path::Path;
use std::sync::Arc;

use pgwire::tokio::tokio_rustls::rustls::ServerConfig;
use pgwire::tokio::TlsAcceptor;

use crate::config::TlsPaths;

/// Build the TLS acceptor for the configured certificate chain and key.
pub fn load_tls_acceptor(paths: &TlsPaths) -> io::Result<TlsAcceptor> {
    let certs: Vec<_> = rustls_pemfile::certs(&mut open(&paths.cert)?)
        .collect::<Result<_, _>>()?;
    if certs.is_empty() {
        return Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("no certificates found in {}", paths.cert.display()),
        ));
    }

    let key = rustls_pemfile::private_key(&mut open(&paths.key)?)?.ok_or_else(|| {
        io::Error::new(
            ErrorKind::InvalidInput,
            format!("no private key found in {}", paths.key.display()),
        )
    })?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;
    config.alpn_protocols = vec![b"postgresql".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &Path) -> io::Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_files_name_the_path() {
        let paths = TlsPaths {
            cert: PathBuf::from("/nonexistent/hotelbook/cert.pem"),
            key: PathBuf::from("/nonexistent/hotelbook/key.pem"),
        };
        let err = load_tls_acceptor(&paths).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("cert.pem"));
    }

    #[test]
    fn empty_cert_file_rejected() {
        let dir = std::env::temp_dir().join("hotelbook_test_tls");
        std::fs::create_dir_all(&dir).unwrap();
        let cert = dir.join("empty_cert.pem");
        std::fs::write(&cert, "").unwrap();
        let paths = TlsPaths {
            cert,
            key: dir.join("unused_key.pem"),
        };
        let err = load_tls_acceptor(&paths).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
