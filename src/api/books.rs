//! Book catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppResult,
    models::{
        book::{BookDetails, BookInput, BorrowedBook, TitleQuery},
        PageQuery,
    },
};

use super::{AuthenticatedUser, PaginatedResponse};

#[derive(Debug, Deserialize, IntoParams)]
pub struct MostBorrowedQuery {
    /// Number of books to return (default: 10)
    pub limit: Option<i64>,
}

/// List books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "List of books", body = PaginatedResponse<BookDetails>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<BookDetails>>> {
    let (books, total) = state.services.books.list_books(&page).await?;
    Ok(Json(PaginatedResponse::new(books, total, &page)))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BookDetails>> {
    let book = state.services.books.get_book(id).await?;
    Ok(Json(book))
}

/// Get book details by ISBN
#[utoipa::path(
    get,
    path = "/books/isbn/{isbn}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("isbn" = String, Path, description = "ISBN")),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book_by_isbn(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(isbn): Path<String>,
) -> AppResult<Json<BookDetails>> {
    let book = state.services.books.get_by_isbn(&isbn).await?;
    Ok(Json(book))
}

/// Search books by title
#[utoipa::path(
    get,
    path = "/books/search/title",
    tag = "books",
    security(("bearer_auth" = [])),
    params(TitleQuery),
    responses(
        (status = 200, description = "Matching books", body = PaginatedResponse<BookDetails>)
    )
)]
pub async fn search_by_title(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<TitleQuery>,
) -> AppResult<Json<PaginatedResponse<BookDetails>>> {
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (books, total) = state.services.books.search_by_title(&query.title, &page).await?;
    Ok(Json(PaginatedResponse::new(books, total, &page)))
}

/// Books written by an author
#[utoipa::path(
    get,
    path = "/books/search/author/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Author ID"), PageQuery),
    responses(
        (status = 200, description = "Books by author", body = PaginatedResponse<BookDetails>),
        (status = 404, description = "Author not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn search_by_author(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<BookDetails>>> {
    let (books, total) = state.services.books.list_by_author(id, &page).await?;
    Ok(Json(PaginatedResponse::new(books, total, &page)))
}

/// Books in a category
#[utoipa::path(
    get,
    path = "/books/search/category/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Category ID"), PageQuery),
    responses(
        (status = 200, description = "Books in category", body = PaginatedResponse<BookDetails>),
        (status = 404, description = "Category not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn search_by_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PaginatedResponse<BookDetails>>> {
    let (books, total) = state.services.books.list_by_category(id, &page).await?;
    Ok(Json(PaginatedResponse::new(books, total, &page)))
}

/// Most borrowed books
#[utoipa::path(
    get,
    path = "/books/most-borrowed",
    tag = "books",
    security(("bearer_auth" = [])),
    params(MostBorrowedQuery),
    responses(
        (status = 200, description = "Books ranked by loan count", body = Vec<BorrowedBook>)
    )
)]
pub async fn most_borrowed(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<MostBorrowedQuery>,
) -> AppResult<Json<Vec<BorrowedBook>>> {
    let books = state.services.books.most_borrowed(query.limit.unwrap_or(10)).await?;
    Ok(Json(books))
}

/// Add a book
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookInput,
    responses(
        (status = 201, description = "Book created", body = BookDetails),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Librarian privileges required", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(input): Json<BookInput>,
) -> AppResult<(StatusCode, Json<BookDetails>)> {
    claims.require_staff()?;

    let book = state.services.books.create_book(input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = BookInput,
    responses(
        (status = 200, description = "Book updated", body = BookDetails),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN taken, total below copies on loan, or concurrent modification", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(input): Json<BookInput>,
) -> AppResult<Json<BookDetails>> {
    claims.require_staff()?;

    let book = state.services.books.update_book(id, input).await?;
    Ok(Json(book))
}

/// Delete a book (soft delete)
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_staff()?;

    state.services.books.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
