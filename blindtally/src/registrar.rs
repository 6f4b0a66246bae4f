use crate::{
    blind_sign, AuthorizationRow, BulletinBoard, Error, Payload, RegisterReply, RegisterRequest,
    Session,
};
use log::{info, warn};
use rsa::RsaPrivateKey;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

/// The blind-signing authority. Owns its immutable signing key and a handle
/// to the shared bulletin board; each accepted connection is handled on its
/// own thread borrowing the service through an `Arc`.
pub struct RegistrarService {
    signing_key: RsaPrivateKey,
    board: Arc<BulletinBoard>,
}

impl RegistrarService {
    pub fn new(signing_key: RsaPrivateKey, board: Arc<BulletinBoard>) -> RegistrarService {
        RegistrarService { signing_key, board }
    }

    /// Accept loop. Handler failures are logged and the loop keeps
    /// accepting; only a dead listener ends it.
    pub fn serve(self: Arc<Self>, listener: TcpListener) {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let service = Arc::clone(&self);
                    std::thread::spawn(move || {
                        if let Err(err) = service.handle_connection(stream) {
                            warn!("registrar: dropping connection: {} ({:?})", err, err.kind());
                        }
                    });
                }
                Err(err) => warn!("registrar: accept failed: {}", err),
            }
        }
    }

    /// One registration session: key exchange, decrypt, authorize, reply.
    pub fn handle_connection(&self, stream: TcpStream) -> Result<(), Error> {
        let mut session = Session::accept(stream, &self.signing_key, &mut rand::rngs::OsRng)?;
        let request = match session.recv()? {
            Payload::Register(request) => request,
            _ => return Err(Error::UnexpectedMessage),
        };
        let reply = self.authorize(request)?;
        session.send(&Payload::RegisterReply(reply))
    }

    /// Issue one blind signature per blinded message. A voter who already
    /// registered gets the stored signatures back unchanged: the voter
    /// committed to specific ciphertexts on first registration, so replaying
    /// the reply authorizes nothing new.
    pub fn authorize(&self, request: RegisterRequest) -> Result<RegisterReply, Error> {
        if request.blinded.is_empty() {
            return Err(Error::LengthMismatch);
        }

        if let Some(row) = self.board.find_authorization(&request.voter_id) {
            info!(
                "registrar: voter {} already registered, returning stored signatures",
                request.voter_id
            );
            return Ok(RegisterReply {
                voter_id: request.voter_id,
                signatures: row.signatures,
            });
        }

        let signatures = request
            .blinded
            .iter()
            .map(|blinded| blind_sign(&self.signing_key, blinded))
            .collect::<Result<Vec<_>, Error>>()?;

        self.board.insert_authorization(AuthorizationRow {
            voter_id: request.voter_id.clone(),
            signatures: signatures.clone(),
        })?;
        info!("registrar: authorized voter {}", request.voter_id);

        Ok(RegisterReply {
            voter_id: request.voter_id,
            signatures,
        })
    }
}
