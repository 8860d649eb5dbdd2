#[tokio::main]
async fn main() {
    bookshelf::start_server().await;
}
