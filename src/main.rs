fn main() {
    lingua_chat_lib::run()
}
