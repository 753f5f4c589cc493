// Local player identity: an opaque wallet-like address that the server uses to tell players apart.
// The address is persisted between runs, so that reconnecting to a match after a restart works.

use std::fs;
use std::io;
use std::path::PathBuf;

use rand::Rng;
use serde::{Deserialize, Serialize};


const HEX_DIGITS: &[u8] = b"0123456789abcdef";
const DEMO_SUFFIX_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(s: impl Into<String>) -> Self { Self(s.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn short(&self) -> String { shorten_address(&self.0) }
}

pub trait IdentityStore {
    fn load(&self) -> io::Result<Option<PlayerId>>;
    fn store(&mut self, id: &PlayerId) -> io::Result<()>;
    fn clear(&mut self) -> io::Result<()>;
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    id: Option<PlayerId>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self { Self::default() }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> io::Result<Option<PlayerId>> { Ok(self.id.clone()) }
    fn store(&mut self, id: &PlayerId) -> io::Result<()> {
        self.id = Some(id.clone());
        Ok(())
    }
    fn clear(&mut self) -> io::Result<()> {
        self.id = None;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityFile {
    wallet_address: PlayerId,
}

// Identity kept in a small JSON file. A missing file means "no identity yet".
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> io::Result<Option<PlayerId>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let file: IdentityFile = serde_json::from_str(&contents).map_err(io::Error::other)?;
        if file.wallet_address.0.is_empty() {
            return Ok(None);
        }
        Ok(Some(file.wallet_address))
    }

    fn store(&mut self, id: &PlayerId) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let file = IdentityFile { wallet_address: id.clone() };
        let contents = serde_json::to_string_pretty(&file).map_err(io::Error::other)?;
        fs::write(&self.path, contents)
    }

    fn clear(&mut self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

// "0x" followed by 40 hex digits, like an Ethereum address.
pub fn generate_address(rng: &mut impl Rng) -> PlayerId {
    let digits: String = (0..40)
        .map(|_| HEX_DIGITS[rng.random_range(0..HEX_DIGITS.len())] as char)
        .collect();
    PlayerId(format!("0x{digits}"))
}

// Clearly fake address for trying things out without a wallet.
pub fn demo_address(rng: &mut impl Rng) -> PlayerId {
    let suffix: String = (0..8)
        .map(|_| DEMO_SUFFIX_CHARS[rng.random_range(0..DEMO_SUFFIX_CHARS.len())] as char)
        .collect();
    PlayerId(format!("0xDemoWallet{suffix}"))
}

// "0x1234...abcd". Strings too short to benefit are returned as is.
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_owned();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
