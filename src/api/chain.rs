use std::sync::Arc;

use actix_web::{Error, HttpResponse, Responder, get, post, web};
use log::{debug, info};

use super::models::{
    AppState, AppendResponse, ChainResponse, DifficultyResponse, MineResponse, StageRequest,
    StageResponse, ValidateResponse,
};
use crate::blockchain::Block;

/// Get the full chain.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let chain = state.ledger.blocks();
    HttpResponse::Ok().json(ChainResponse {
        length: chain.len(),
        difficulty: state.ledger.difficulty(),
        chain,
    })
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ValidateResponse {
        valid: state.ledger.is_valid_chain(),
        length: state.ledger.len(),
        difficulty: state.ledger.difficulty(),
    })
}

/// Get the ledger's fixed PoW difficulty.
#[get("/difficulty/")]
pub async fn get_difficulty(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(DifficultyResponse {
        difficulty: state.ledger.difficulty(),
    })
}

/// Stage a record for the next mined block.
#[post("/data/")]
pub async fn stage_data(
    state: web::Data<AppState>,
    body: web::Json<StageRequest>,
) -> impl Responder {
    let pending = state.ledger.stage(body.into_inner().data);
    debug!("POST /data/ - staged ({} pending)", pending);
    HttpResponse::Ok().json(StageResponse { pending })
}

/// Mine pending records into a new block and relay it to the peer, if any.
#[post("/mine/")]
pub async fn mine_block(state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let ledger = Arc::clone(&state.ledger);
    let block = web::block(move || ledger.mine()).await??;

    if let Some(peer) = &state.peer {
        peer.relay_block(&block);
    }

    let resp = MineResponse {
        height: state.ledger.len(),
        hash: block.hash,
        nonce: block.nonce,
        records: block.records.len(),
        difficulty: state.ledger.difficulty(),
    };
    info!("POST /mine/ - sealed block (hash={}, nonce={})", resp.hash, resp.nonce);
    Ok(HttpResponse::Ok().json(resp))
}

/// Append a block sealed elsewhere; rejected unless it extends the tip with a valid seal.
#[post("/block/")]
pub async fn append_block(
    state: web::Data<AppState>,
    body: web::Json<Block>,
) -> Result<HttpResponse, Error> {
    let block = body.into_inner();
    let hash = block.hash.clone();
    let ledger = Arc::clone(&state.ledger);
    web::block(move || ledger.append(block)).await??;

    Ok(HttpResponse::Ok().json(AppendResponse {
        height: state.ledger.len(),
        hash,
    }))
}
